//! DID resolution adapters: a local-filesystem path that
//! walks a configured user-data root, and a remote HTTP path that fetches
//! `did.json` from the DID's own host. `ChainResolver` tries local first,
//! falling back to remote, exactly as
//! `resolve_did_wba_document`'s local-then-remote fallback order in the
//! original `anp_open_sdk`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use wba_core::did::WbaDid;
use wba_core::document::DidDocument;
use wba_sdk::error::SdkError;
use wba_sdk::resolver::DidResolver;

const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Resolves DIDs against `did_document.json` files under a configured
/// user-data root (`user_<hex16>/did_document.json`,
/// `user_hosted_<host>_<port>_<hex16>/did_document.json` for hosted
/// DIDs), mirroring `router_did.py::get_did_document`'s directory walk.
pub struct LocalFsResolver {
    user_did_root: PathBuf,
    user_hosted_root: PathBuf,
}

impl LocalFsResolver {
    pub fn new(user_did_root: impl Into<PathBuf>, user_hosted_root: impl Into<PathBuf>) -> Self {
        LocalFsResolver {
            user_did_root: user_did_root.into(),
            user_hosted_root: user_hosted_root.into(),
        }
    }

    async fn scan(root: &Path, did: &str) -> Option<DidDocument> {
        let mut entries = tokio::fs::read_dir(root).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let candidate = entry.path().join("did_document.json");
            let Ok(bytes) = tokio::fs::read(&candidate).await else {
                continue;
            };
            let Ok(document) = serde_json::from_slice::<DidDocument>(&bytes) else {
                continue;
            };
            if document.id == did {
                return Some(document);
            }
        }
        None
    }
}

#[async_trait]
impl DidResolver for LocalFsResolver {
    async fn resolve(&self, did: &str) -> Result<DidDocument, SdkError> {
        if let Some(document) = Self::scan(&self.user_did_root, did).await {
            return Ok(document);
        }
        if let Some(document) = Self::scan(&self.user_hosted_root, did).await {
            return Ok(document);
        }
        Err(SdkError::Resolution {
            did: did.to_string(),
            reason: "no did_document.json under the configured user roots matched".into(),
        })
    }
}

/// Resolves DIDs by fetching `http://<host>:<port>/wba/user/<hex16>/did.json`
/// (or `/wba/hostuser/<hex16>/did.json`) from the DID's own authority,
/// with a 10-second deadline.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResolver {
    pub fn new() -> Self {
        HttpResolver {
            client: reqwest::Client::builder()
                .timeout(REMOTE_TIMEOUT)
                .build()
                .expect("reqwest client builds with a fixed timeout"),
        }
    }

    fn well_known_url(did: &WbaDid, hosted: bool) -> String {
        let segment = if hosted { "hostuser" } else { "user" };
        format!("http://{}/wba/{segment}/{}/did.json", did.authority(), did.local_id)
    }
}

#[async_trait]
impl DidResolver for HttpResolver {
    async fn resolve(&self, did: &str) -> Result<DidDocument, SdkError> {
        let parsed = WbaDid::parse(did).map_err(SdkError::Protocol)?;
        let hosted = parsed.path_segments.iter().any(|s| s == "hostuser");
        let url = Self::well_known_url(&parsed, hosted);

        let response = self.client.get(&url).send().await.map_err(|e| SdkError::Resolution {
            did: did.to_string(),
            reason: format!("GET {url} failed: {e}"),
        })?;
        if !response.status().is_success() {
            return Err(SdkError::Resolution {
                did: did.to_string(),
                reason: format!("GET {url} returned {}", response.status()),
            });
        }
        response.json::<DidDocument>().await.map_err(|e| SdkError::Resolution {
            did: did.to_string(),
            reason: format!("invalid DID document JSON: {e}"),
        })
    }
}

/// Fronts any [`DidResolver`] with a short-TTL cache keyed by DID string,
/// since the two-way handshake and its reply-verification round trip
/// commonly re-resolve the same remote document within seconds.
pub struct CachedResolver<R> {
    inner: R,
    cache: Cache<String, DidDocument>,
}

impl<R: DidResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        CachedResolver {
            inner,
            cache: Cache::builder().time_to_live(CACHE_TTL).build(),
        }
    }
}

#[async_trait]
impl<R: DidResolver> DidResolver for CachedResolver<R> {
    async fn resolve(&self, did: &str) -> Result<DidDocument, SdkError> {
        if let Some(document) = self.cache.get(did).await {
            return Ok(document);
        }
        let document = self.inner.resolve(did).await?;
        self.cache.insert(did.to_string(), document.clone()).await;
        Ok(document)
    }
}

/// Tries a local resolver first, then a remote one, matching
/// `resolve_did_wba_document`'s fallback order.
pub struct ChainResolver<L, Rm> {
    local: L,
    remote: Rm,
}

impl<L: DidResolver, Rm: DidResolver> ChainResolver<L, Rm> {
    pub fn new(local: L, remote: Rm) -> Self {
        ChainResolver { local, remote }
    }
}

#[async_trait]
impl<L: DidResolver, Rm: DidResolver> DidResolver for ChainResolver<L, Rm> {
    async fn resolve(&self, did: &str) -> Result<DidDocument, SdkError> {
        match self.local.resolve(did).await {
            Ok(document) => Ok(document),
            Err(_) => self.remote.resolve(did).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wba_core::document::{DidDocument as Doc, VerificationMethod, VerificationRef};

    fn sample_document(did: &str) -> Doc {
        Doc {
            context: vec!["https://www.w3.org/ns/did/v1".into()],
            id: did.into(),
            also_known_as: vec![],
            verification_method: vec![VerificationMethod {
                id: format!("{did}#key-1"),
                type_: "EcdsaSecp256k1VerificationKey2019".into(),
                controller: did.into(),
                public_key_multibase: None,
                public_key_hex: Some("02".to_string() + &"ab".repeat(32)),
                public_key_jwk: None,
            }],
            authentication: vec![VerificationRef::Id(format!("{did}#key-1"))],
            assertion_method: vec![],
            service: vec![],
        }
    }

    #[tokio::test]
    async fn local_resolver_scans_user_directories() {
        let tmp = tempdir();
        let did = "did:wba:example.com:wba:user:0123456789abcdef";
        let user_dir = tmp.join("user_0123456789abcdef");
        tokio::fs::create_dir_all(&user_dir).await.unwrap();
        tokio::fs::write(
            user_dir.join("did_document.json"),
            serde_json::to_vec(&sample_document(did)).unwrap(),
        )
        .await
        .unwrap();

        let resolver = LocalFsResolver::new(&tmp, tmp.join("hosted"));
        let resolved = resolver.resolve(did).await.unwrap();
        assert_eq!(resolved.id, did);

        tokio::fs::remove_dir_all(&tmp).await.ok();
    }

    #[tokio::test]
    async fn local_resolver_reports_not_found() {
        let tmp = tempdir();
        tokio::fs::create_dir_all(&tmp).await.unwrap();
        let resolver = LocalFsResolver::new(&tmp, tmp.join("hosted"));
        assert!(resolver.resolve("did:wba:nope.com:wba:user:ffffffffffffffff").await.is_err());
        tokio::fs::remove_dir_all(&tmp).await.ok();
    }

    fn tempdir() -> PathBuf {
        std::env::temp_dir().join(format!("wba-resolver-test-{}", uuid::Uuid::new_v4()))
    }
}
