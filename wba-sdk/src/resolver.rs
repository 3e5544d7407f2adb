//! The DID resolution seam. `wba-sdk` only defines the
//! trait; concrete local-filesystem and HTTP-with-cache implementations
//! live in `wba-framework`, grounded on
//! `resolve_did_wba_document`'s local-then-remote fallback in
//! `anp_open_sdk/protocol/authentication/did_wba.py`.

use async_trait::async_trait;
use wba_core::document::DidDocument;

use crate::error::SdkError;

#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolves a `did:wba:...` string to its DID document. Implementations
    /// decide how to reach the document (local store, HTTP well-known path,
    /// cache); callers only see success or an [`SdkError::Resolution`].
    async fn resolve(&self, did: &str) -> Result<DidDocument, SdkError>;
}
