//! Shared application state: the agent registry, the authorization
//! handler registry, and the exempt-path / interface-file configuration
//! the middleware and route handlers read from.

use std::path::PathBuf;
use std::sync::Arc;

use wba_sdk::registry::AuthDispatch;

use crate::router::AgentRouter;

#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<AgentRouter>,
    pub handlers: Arc<dyn AuthDispatch>,
    pub exempt_paths: Vec<String>,
    pub interfaces_root: PathBuf,
}

impl AppState {
    pub fn new(agents: Arc<AgentRouter>, handlers: Arc<dyn AuthDispatch>, exempt_paths: Vec<String>, interfaces_root: PathBuf) -> Self {
        AppState {
            agents,
            handlers,
            exempt_paths,
            interfaces_root,
        }
    }

    /// Whether `path` skips authentication entirely: document/interface-
    /// serving and discovery endpoints.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}
