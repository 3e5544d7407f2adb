//! In-process default implementation of the token storage seams, backed
//! by `parking_lot::RwLock` over two maps keyed by the directional
//! `(caller_did, target_did)` pair — matching the use of `parking_lot`
//! for low-overhead synchronous locking around small in-memory critical
//! sections seen in `anda_engine`'s context state. A
//! persistent implementation can replace this without touching SDK logic,
//! since both seams are trait objects.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;
use wba_sdk::error::SdkError;
use wba_sdk::token::{TokenCache, TokenIssuer, TokenRecord};

/// Tokens this agent *issued* to remote callers (`token_from_remote` in
/// the data model — "from" the callee's perspective, a token the remote
/// will present back), looked up by the opaque token string.
#[derive(Default)]
pub struct InMemoryTokenIssuer {
    by_token: RwLock<HashMap<String, TokenRecord>>,
}

impl InMemoryTokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenIssuer for InMemoryTokenIssuer {
    async fn issue(&self, caller_did: &str, target_did: &str, ttl: Duration) -> Result<TokenRecord, SdkError> {
        let now = Utc::now();
        let record = TokenRecord {
            token: Uuid::new_v4().to_string(),
            caller_did: caller_did.to_string(),
            target_did: target_did.to_string(),
            issued_at: now,
            expires_at: now + ttl,
            revoked: false,
        };
        self.by_token.write().insert(record.token.clone(), record.clone());
        Ok(record)
    }

    async fn validate(&self, token: &str) -> Result<TokenRecord, SdkError> {
        self.by_token.read().get(token).cloned().ok_or(SdkError::UnknownToken)
    }

    async fn revoke(&self, token: &str) -> Result<(), SdkError> {
        if let Some(record) = self.by_token.write().get_mut(token) {
            record.revoked = true;
        }
        Ok(())
    }
}

/// Tokens this agent *holds* after a remote target issued one back during
/// two-way authentication (`token_to_remote`), cached by the
/// `(caller_did, target_did)` pair so the outbound client can reuse them
/// instead of re-signing every request.
#[derive(Default)]
pub struct InMemoryTokenCache {
    by_pair: RwLock<HashMap<(String, String), TokenRecord>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, caller_did: &str, target_did: &str) -> Option<TokenRecord> {
        self.by_pair
            .read()
            .get(&(caller_did.to_string(), target_did.to_string()))
            .cloned()
    }

    async fn put(&self, record: TokenRecord) {
        self.by_pair
            .write()
            .insert((record.caller_did.clone(), record.target_did.clone()), record);
    }

    async fn clear(&self, caller_did: &str, target_did: &str) {
        self.by_pair
            .write()
            .remove(&(caller_did.to_string(), target_did.to_string()));
    }

    async fn clear_all(&self, caller_did: &str) {
        self.by_pair.write().retain(|(caller, _), _| caller != caller_did);
    }
}
