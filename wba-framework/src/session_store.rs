//! In-process default implementation of the session layer, ported from
//! `session_manager.py`'s `SessionManager`/
//! `SessionStorage` pair including `extend_session`/
//! `cleanup_expired_sessions`, backed by the same `parking_lot::RwLock`
//! pattern as [`crate::token_store`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use wba_sdk::error::SdkError;
use wba_sdk::session::{SessionRecord, SessionStore};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, caller_did: &str, target_did: &str, auth_method: &str, ttl: Duration) -> SessionRecord {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            caller_did: caller_did.to_string(),
            target_did: target_did.to_string(),
            auth_method: auth_method.to_string(),
            created_at: now,
            expires_at: now + ttl,
            last_used: now,
        };
        self.sessions.write().insert(record.id, record.clone());
        record
    }

    async fn validate(&self, id: Uuid) -> Result<SessionRecord, SdkError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let record = sessions.get(&id).ok_or(SdkError::UnknownSession)?;
        if !record.is_valid(now) {
            sessions.remove(&id);
            return Err(SdkError::SessionExpired);
        }
        let record = sessions.get_mut(&id).expect("checked above");
        record.last_used = now;
        Ok(record.clone())
    }

    async fn extend(&self, id: Uuid, ttl: Duration) -> Result<SessionRecord, SdkError> {
        let mut sessions = self.sessions.write();
        let record = sessions.get_mut(&id).ok_or(SdkError::UnknownSession)?;
        record.expires_at = Utc::now() + ttl;
        Ok(record.clone())
    }

    async fn revoke(&self, id: Uuid) -> Result<(), SdkError> {
        self.sessions.write().remove(&id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, record| record.is_valid(now));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_session_is_deleted_on_validate() {
        let store = InMemorySessionStore::new();
        let record = store.create("C", "S", "DIDWba", Duration::seconds(-1)).await;

        assert!(matches!(store.validate(record.id).await, Err(SdkError::SessionExpired)));
        assert!(matches!(store.validate(record.id).await, Err(SdkError::UnknownSession)));
    }

    #[tokio::test]
    async fn extend_pushes_out_expiry() {
        let store = InMemorySessionStore::new();
        let record = store.create("C", "S", "DIDWba", Duration::seconds(1)).await;
        let extended = store.extend(record.id, Duration::hours(1)).await.unwrap();
        assert!(extended.expires_at > record.expires_at);
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired() {
        let store = InMemorySessionStore::new();
        store.create("C", "S1", "DIDWba", Duration::seconds(-1)).await;
        store.create("C", "S2", "DIDWba", Duration::hours(1)).await;

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.sessions.read().len(), 1);
    }
}
