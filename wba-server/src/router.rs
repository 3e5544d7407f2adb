//! The in-process local-agent registry, grounded on `router_agent.py`'s
//! `AgentRouter`/`route_request` and generalized onto a dyn-dispatch-
//! over-registry shape (`anda_core::agent`'s `AgentSet`/`AgentDyn`).
//! Capability dispatch (`api_call`, `message`, `group_*`) is expressed as
//! three narrow traits composed per agent at
//! construction time, replacing a dynamic attribute lookup with static
//! dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use wba_core::did::WbaDid;
use wba_core::document::DidDocument;
use wba_framework::ContactBook;
use wba_sdk::credentials::AgentCredentials;

use crate::error::RoutingError;

#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn handle_api(&self, path: &str, method: &str, data: Value) -> Result<Value, RoutingError>;
}

#[async_trait]
pub trait Messager: Send + Sync {
    async fn handle_message(&self, message_type: &str, data: Value) -> Result<Value, RoutingError>;
}

#[async_trait]
pub trait GroupHandler: Send + Sync {
    async fn group_join(&self, group_id: &str, data: Value) -> Result<Value, RoutingError>;
    async fn group_leave(&self, group_id: &str, data: Value) -> Result<Value, RoutingError>;
    async fn group_message(&self, group_id: &str, data: Value) -> Result<Value, RoutingError>;
    async fn group_members(&self, group_id: &str) -> Result<Value, RoutingError>;
}

/// What an incoming request is asking the target agent to do, mirroring
/// `request_data["type"]` in the original's dispatch table.
#[derive(Debug, Clone)]
pub enum RequestKind {
    ApiCall { path: String, method: String },
    Message { message_type: String },
    GroupJoin { group_id: String },
    GroupLeave { group_id: String },
    GroupMessage { group_id: String },
    GroupMembers { group_id: String },
}

/// One agent hosted by this process: its identity, its credentials, and
/// whichever of the three capability traits it implements.
pub struct LocalAgent {
    pub did: String,
    pub name: String,
    pub hosted: bool,
    pub document: DidDocument,
    pub credentials: AgentCredentials,
    pub contacts: ContactBook,
    api: Option<Arc<dyn ApiHandler>>,
    messager: Option<Arc<dyn Messager>>,
    group: Option<Arc<dyn GroupHandler>>,
}

impl LocalAgent {
    pub fn new(did: impl Into<String>, name: impl Into<String>, document: DidDocument, credentials: AgentCredentials) -> Self {
        LocalAgent {
            did: did.into(),
            name: name.into(),
            hosted: false,
            document,
            credentials,
            contacts: ContactBook::new(),
            api: None,
            messager: None,
            group: None,
        }
    }

    pub fn hosted(mut self) -> Self {
        self.hosted = true;
        self
    }

    pub fn with_api_handler(mut self, handler: Arc<dyn ApiHandler>) -> Self {
        self.api = Some(handler);
        self
    }

    pub fn with_messager(mut self, handler: Arc<dyn Messager>) -> Self {
        self.messager = Some(handler);
        self
    }

    pub fn with_group_handler(mut self, handler: Arc<dyn GroupHandler>) -> Self {
        self.group = Some(handler);
        self
    }

    pub fn has_messager(&self) -> bool {
        self.messager.is_some()
    }

    pub fn has_group_handler(&self) -> bool {
        self.group.is_some()
    }

    pub async fn dispatch(&self, kind: &RequestKind, data: Value) -> Result<Value, RoutingError> {
        match kind {
            RequestKind::ApiCall { path, method } => {
                let handler = self.api.as_ref().ok_or(RoutingError::NotImplemented)?;
                handler.handle_api(path, method, data).await
            }
            RequestKind::Message { message_type } => {
                let handler = self.messager.as_ref().ok_or(RoutingError::NotImplemented)?;
                handler.handle_message(message_type, data).await
            }
            RequestKind::GroupJoin { group_id } => {
                self.group.as_ref().ok_or(RoutingError::NotImplemented)?.group_join(group_id, data).await
            }
            RequestKind::GroupLeave { group_id } => {
                self.group.as_ref().ok_or(RoutingError::NotImplemented)?.group_leave(group_id, data).await
            }
            RequestKind::GroupMessage { group_id } => {
                self.group.as_ref().ok_or(RoutingError::NotImplemented)?.group_message(group_id, data).await
            }
            RequestKind::GroupMembers { group_id } => {
                self.group.as_ref().ok_or(RoutingError::NotImplemented)?.group_members(group_id).await
            }
        }
    }
}

/// The process-wide agent directory, keyed by DID string.
#[derive(Default)]
pub struct AgentRouter {
    agents: RwLock<BTreeMap<String, Arc<LocalAgent>>>,
}

impl AgentRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent: LocalAgent) -> Result<(), RoutingError> {
        let mut agents = self.agents.write();
        if agents.contains_key(&agent.did) {
            return Err(RoutingError::AlreadyRegistered(agent.did));
        }
        agents.insert(agent.did.clone(), Arc::new(agent));
        Ok(())
    }

    pub fn unregister(&self, did: &str) -> Option<Arc<LocalAgent>> {
        self.agents.write().remove(did)
    }

    pub fn get(&self, did: &str) -> Option<Arc<LocalAgent>> {
        self.agents.read().get(did).cloned()
    }

    /// Finds the registered agent whose local id matches `local_id`,
    /// among either the hosted or non-hosted agents (the
    /// `/wba/user/{id}/...` vs `/wba/hostuser/{id}/...` split).
    pub fn by_local_id(&self, local_id: &str, hosted: bool) -> Option<Arc<LocalAgent>> {
        self.agents
            .read()
            .values()
            .find(|a| a.hosted == hosted && WbaDid::parse(&a.did).map(|d| d.local_id == local_id).unwrap_or(false))
            .cloned()
    }

    /// All non-hosted agents, for `/publisher/agents`.
    pub fn local_agents(&self) -> Vec<Arc<LocalAgent>> {
        self.agents.read().values().filter(|a| !a.hosted).cloned().collect()
    }

    pub async fn route(&self, target_did: &str, kind: RequestKind, data: Value) -> Result<Value, RoutingError> {
        let agent = self.get(target_did).ok_or_else(|| RoutingError::AgentNotFound(target_did.to_string()))?;
        agent.dispatch(&kind, data).await
    }
}

#[cfg(test)]
mod tests {
    use wba_core::crypto::SigningMaterial;
    use wba_core::document::DidDocument;

    use super::*;

    fn fixture_agent(did: &str) -> LocalAgent {
        let signing = SigningMaterial::from_secp256k1_hex("f8c89b32a2fc1d1caf0c4d1aea8f8e6f8a9ebdb5d8bcda6a8a3c0b62470a0f55").unwrap();
        let credentials = AgentCredentials::new(did, format!("{did}#keys-1"), signing);
        let document = DidDocument {
            context: vec!["https://www.w3.org/ns/did/v1".into()],
            id: did.to_string(),
            also_known_as: vec![],
            verification_method: vec![],
            authentication: vec![],
            assertion_method: vec![],
            service: vec![],
        };
        LocalAgent::new(did, "fixture", document, credentials)
    }

    #[test]
    fn registers_and_looks_up_by_local_id() {
        let router = AgentRouter::new();
        let did = "did:wba:example.com:wba:user:0000000000000001";
        router.register(fixture_agent(did)).unwrap();

        assert!(router.by_local_id("0000000000000001", false).is_some());
        assert!(router.by_local_id("0000000000000001", true).is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let router = AgentRouter::new();
        let did = "did:wba:example.com:wba:user:0000000000000002";
        router.register(fixture_agent(did)).unwrap();
        assert!(router.register(fixture_agent(did)).is_err());
    }

    #[tokio::test]
    async fn routing_to_an_agent_without_the_capability_is_not_implemented() {
        let router = AgentRouter::new();
        let did = "did:wba:example.com:wba:user:0000000000000003";
        router.register(fixture_agent(did)).unwrap();

        let result = router
            .route(did, RequestKind::Message { message_type: "*".into() }, serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(RoutingError::NotImplemented)));
    }

    #[tokio::test]
    async fn routing_to_an_unregistered_agent_is_not_found() {
        let router = AgentRouter::new();
        let result = router
            .route("did:wba:nobody.example:wba:user:ffffffffffffffff", RequestKind::GroupMembers { group_id: "g1".into() }, serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(RoutingError::AgentNotFound(_))));
    }
}
