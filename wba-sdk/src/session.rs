//! Session layer, grounded on `SessionManager` /
//! `SessionStorage` / `SessionAuthHandler` in
//! `anp_open_sdk/auth/session_manager.py`: an optional layer on top of the
//! base token authentication that trades a short-lived UUID for repeated
//! re-verification of the underlying credential.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::context::AuthContext;
use crate::credentials::AgentCredentials;
use crate::error::SdkError;
use crate::registry::{AuthDispatch, AuthResult, HandlerRegistry, header_scheme};

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub caller_did: String,
    pub target_did: String,
    /// The scheme that originally authenticated this session: a
    /// DID/Bearer/Token verification that a session now stands in for.
    pub auth_method: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, caller_did: &str, target_did: &str, auth_method: &str, ttl: chrono::Duration) -> SessionRecord;
    /// Validates `id`, refreshing `last_used` on success and deleting the
    /// record outright once it is found to be expired.
    async fn validate(&self, id: Uuid) -> Result<SessionRecord, SdkError>;
    async fn extend(&self, id: Uuid, ttl: chrono::Duration) -> Result<SessionRecord, SdkError>;
    async fn revoke(&self, id: Uuid) -> Result<(), SdkError>;
    /// Sweeps every expired session out of the store, returning how many
    /// were removed.
    async fn cleanup_expired(&self) -> usize;
}

/// Parses the `Session`/`SessionID` header value into a session id,
/// rejecting malformed UUIDs before they ever reach the store.
pub fn parse_session_id(raw: &str) -> Result<Uuid, SdkError> {
    Uuid::parse_str(raw.trim()).map_err(|_| SdkError::UnknownSession)
}

/// Wraps a [`HandlerRegistry`] with the session layer: a `Session`/
/// `SessionID` header short-circuits straight to session validation,
/// while any other successfully verified header gets a session minted
/// on top of it, so a caller can trade a freshly verified DID/Bearer/
/// Token credential for a short-lived session id on the next request.
pub struct SessionAwareAuthManager {
    inner: HandlerRegistry,
    sessions: Arc<dyn SessionStore>,
    config: AuthConfig,
}

impl SessionAwareAuthManager {
    pub fn new(inner: HandlerRegistry, sessions: Arc<dyn SessionStore>, config: AuthConfig) -> Self {
        SessionAwareAuthManager { inner, sessions, config }
    }

    pub async fn verify(&self, header: &str, ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        if matches!(header_scheme(header), Some("Session") | Some("SessionID")) {
            return self.inner.verify(header, ctx).await;
        }

        let result = self.inner.verify(header, ctx).await?;
        if !result.success {
            return Ok(result);
        }
        let caller_did = result.caller_did.clone().unwrap_or_default();
        let target_did = ctx.target_did.as_deref().unwrap_or_default();
        let scheme = header_scheme(header).unwrap_or_default();
        let record = self.sessions.create(&caller_did, target_did, scheme, self.config.session_ttl()).await;
        Ok(result.with_session_id(record.id))
    }

    pub async fn build(&self, header: &str, ctx: &AuthContext, credentials: &AgentCredentials) -> Result<String, SdkError> {
        self.inner.build(header, ctx, credentials).await
    }
}

#[async_trait]
impl AuthDispatch for SessionAwareAuthManager {
    async fn verify(&self, header: &str, ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        SessionAwareAuthManager::verify(self, header, ctx).await
    }

    async fn build(&self, header: &str, ctx: &AuthContext, credentials: &AgentCredentials) -> Result<String, SdkError> {
        SessionAwareAuthManager::build(self, header, ctx, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_session_id() {
        assert!(parse_session_id("not-a-uuid").is_err());
    }

    #[test]
    fn expired_session_is_invalid() {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::nil(),
            caller_did: "did:wba:a.com:wba:agent:0000000000000000".into(),
            target_did: "did:wba:b.com:wba:agent:1111111111111111".into(),
            auth_method: "DIDWba".into(),
            created_at: now - chrono::Duration::hours(2),
            expires_at: now - chrono::Duration::hours(1),
            last_used: now - chrono::Duration::hours(2),
        };
        assert!(!record.is_valid(now));
    }
}
