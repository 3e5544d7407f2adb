//! Bearer-token issuance and validation, keyed by the directional
//! `(caller_did, target_did)` pair. Grounded on the two-way token exchange
//! in `did_wba_auth_header.py` (`update_token`): a token this agent
//! issued *to* a remote caller (`token_to_remote`) is a different record
//! from a token this agent holds *for* a remote target
//! (`token_from_remote`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SdkError;

#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub token: String,
    pub caller_did: String,
    pub target_did: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl TokenRecord {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

/// Storage for tokens this agent *issues* to remote callers, looked up by
/// the token string on every subsequent request.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, caller_did: &str, target_did: &str, ttl: chrono::Duration) -> Result<TokenRecord, SdkError>;
    async fn validate(&self, token: &str) -> Result<TokenRecord, SdkError>;
    async fn revoke(&self, token: &str) -> Result<(), SdkError>;
}

/// Storage for tokens this agent *holds* after a remote target issued one
/// back to it during two-way authentication, looked up by the
/// `(caller_did, target_did)` pair so the client can reuse it instead of
/// re-signing every request.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self, caller_did: &str, target_did: &str) -> Option<TokenRecord>;
    async fn put(&self, record: TokenRecord);
    async fn clear(&self, caller_did: &str, target_did: &str);
    async fn clear_all(&self, caller_did: &str);
}
