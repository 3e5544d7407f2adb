//! HTTP router and server: agent registry, auth middleware, DID-document
//! and agent-description endpoints. `ServerBuilder`, `shutdown_signal`,
//! and `create_reuse_port_listener` are adapted near-unchanged from
//! `anda_engine_server` — they are infrastructure, not domain logic.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use wba_core::BoxError;
use wba_sdk::registry::{AuthDispatch, HandlerRegistry};

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::RoutingError;
pub use middleware::VerifiedCaller;
pub use router::{AgentRouter, ApiHandler, GroupHandler, LocalAgent, Messager, RequestKind};
pub use state::AppState;

const APP_NAME: &str = env!("CARGO_PKG_NAME");
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The default set of URL prefixes that bypass authentication: document/
/// interface serving and publisher discovery.
pub fn default_exempt_paths() -> Vec<String> {
    vec!["/wba/".to_string(), "/publisher/agents".to_string()]
}

pub struct ServerBuilder {
    app_name: String,
    app_version: String,
    addr: String,
    agents: Arc<AgentRouter>,
    handlers: Arc<dyn AuthDispatch>,
    exempt_paths: Vec<String>,
    interfaces_root: PathBuf,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        ServerBuilder {
            app_name: APP_NAME.to_string(),
            app_version: APP_VERSION.to_string(),
            addr: "127.0.0.1:9527".to_string(),
            agents: Arc::new(AgentRouter::new()),
            handlers: Arc::new(HandlerRegistry::new()),
            exempt_paths: default_exempt_paths(),
            interfaces_root: PathBuf::from("."),
        }
    }

    pub fn with_app_name(mut self, app_name: String) -> Self {
        self.app_name = app_name;
        self
    }

    pub fn with_app_version(mut self, app_version: String) -> Self {
        self.app_version = app_version;
        self
    }

    pub fn with_addr(mut self, addr: String) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_agents(mut self, agents: Arc<AgentRouter>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_handlers(mut self, handlers: Arc<dyn AuthDispatch>) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_exempt_paths(mut self, exempt_paths: Vec<String>) -> Self {
        self.exempt_paths = exempt_paths;
        self
    }

    pub fn with_interfaces_root(mut self, interfaces_root: PathBuf) -> Self {
        self.interfaces_root = interfaces_root;
        self
    }

    /// Builds the routed `axum::Router` without binding a listener —
    /// the seam integration tests use to drive the app over a real HTTP
    /// connection on an ephemeral port (see `wba-server/tests/`).
    pub fn build_router(self) -> Router {
        if self.agents.local_agents().is_empty() {
            log::warn!("building server router with no agents registered");
        }

        let state = AppState::new(self.agents, self.handlers, self.exempt_paths, self.interfaces_root);
        Router::new()
            .route("/wba/user/{hex16}/did.json", get(handlers::serve_did_document))
            .route("/wba/user/{hex16}/ad.json", get(handlers::serve_ad_json))
            .route("/wba/user/{hex16}/{file}", get(handlers::serve_interface_file))
            .route("/wba/hostuser/{hex16}/did.json", get(handlers::serve_hosted_did_document))
            .route("/publisher/agents", get(handlers::publisher_agents))
            .route("/agent/api/{did}/{*subpath}", get(handlers::agent_api).post(handlers::agent_api))
            .route("/agent/message/{did}/post", axum::routing::post(handlers::agent_message))
            .route("/agent/group/{did}/{group_id}/connect", get(handlers::agent_group_connect))
            .route("/agent/group/{did}/{group_id}/{action}", axum::routing::post(handlers::agent_group_action))
            .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth_middleware))
            .with_state(state)
    }

    pub async fn serve(self, signal: impl Future<Output = ()> + Send + 'static) -> Result<(), BoxError> {
        if self.agents.local_agents().is_empty() {
            return Err("no agents registered".into());
        }

        let addr: SocketAddr = self.addr.parse()?;
        let app_name = self.app_name.clone();
        let app_version = self.app_version.clone();
        let app = self.build_router();

        let listener = create_reuse_port_listener(addr).await?;
        log::warn!("{app_name}@{app_version} listening on {addr:?}");

        axum::serve(listener, app).with_graceful_shutdown(signal).await?;

        Ok(())
    }
}

pub async fn shutdown_signal(cancel_token: CancellationToken, wait_duration: Duration) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("received termination signal, starting graceful shutdown");
    cancel_token.cancel();
    tokio::time::sleep(wait_duration).await;
}

pub async fn create_reuse_port_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener, BoxError> {
    let socket = match &addr {
        SocketAddr::V4(_) => tokio::net::TcpSocket::new_v4()?,
        SocketAddr::V6(_) => tokio::net::TcpSocket::new_v6()?,
    };

    socket.set_reuseport(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    Ok(listener)
}
