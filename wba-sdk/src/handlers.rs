//! The built-in [`AuthHandler`] implementations: `DIDWba`, `Bearer`,
//! `Token`/`CustomToken`, `Session`/`SessionID`.
//! Business logic only — DID resolution, token storage, and session
//! storage are injected as trait objects so `wba-framework` can supply
//! concrete I/O-backed implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use wba_core::header::{AuthScheme, verify_timestamp_window};
use wba_core::payload::SignedPayload;

use crate::config::AuthConfig;
use crate::context::AuthContext;
use crate::credentials::AgentCredentials;
use crate::error::SdkError;
use crate::registry::{AuthHandler, AuthResult, header_scheme};
use crate::resolver::DidResolver;
use crate::session::{SessionStore, parse_session_id};
use crate::token::{TokenCache, TokenIssuer, TokenRecord};

/// `DIDWba ...` — the core case. Verifies a one-way or
/// two-way signed header; on a successful two-way verification, mints a
/// reciprocal header (and, if a token issuer is configured, a bearer
/// token) signed with the server's own credentials.
pub struct DidWbaHandler {
    resolver: Arc<dyn DidResolver>,
    config: AuthConfig,
    token_issuer: Option<Arc<dyn TokenIssuer>>,
}

impl DidWbaHandler {
    pub fn new(resolver: Arc<dyn DidResolver>, config: AuthConfig) -> Self {
        DidWbaHandler {
            resolver,
            config,
            token_issuer: None,
        }
    }

    pub fn with_token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.token_issuer = Some(issuer);
        self
    }
}

#[async_trait]
impl AuthHandler for DidWbaHandler {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::DidWba
    }

    fn can_handle(&self, header: &str) -> bool {
        header_scheme(header) == Some("DIDWba")
    }

    async fn build(&self, ctx: &AuthContext, credentials: &AgentCredentials) -> Result<String, SdkError> {
        let now = Utc::now();
        if ctx.use_two_way_auth {
            let target = ctx
                .target_did
                .as_deref()
                .ok_or_else(|| SdkError::Auth("two-way auth requires a target_did".into()))?;
            credentials.build_auth_header_two_way(&ctx.domain, target, now)
        } else {
            credentials.build_auth_header(&ctx.domain, now)
        }
    }

    async fn verify(&self, header: &str, ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        let parsed = crate::registry::parse_as(header, AuthScheme::DidWba)?;
        let fields = match parsed {
            wba_core::header::ParsedAuthorization::DidWba(f) => f,
            _ => unreachable!("parse_as checked the scheme"),
        };

        verify_timestamp_window(&fields.timestamp, Utc::now(), self.config.nonce_window())
            .map_err(SdkError::Protocol)?;

        let document = self
            .resolver
            .resolve(&fields.did)
            .await
            .map_err(|_| SdkError::Resolution {
                did: fields.did.clone(),
                reason: "document not found".into(),
            })?;

        let vm_fragment = fields
            .verification_method
            .as_deref()
            .ok_or(SdkError::Protocol(wba_core::ProtocolError::MissingField("verification_method")))?;
        let authorized = document
            .authentication
            .iter()
            .any(|r| r.id() == vm_fragment || r.id().ends_with(vm_fragment));
        if !authorized {
            return Err(SdkError::Auth(format!(
                "verification method {vm_fragment} is not in the DID document's authentication set"
            )));
        }
        let vm = document.resolve_verification_method(vm_fragment).map_err(SdkError::Protocol)?;
        let key = vm.key_material().map_err(SdkError::Protocol)?;

        // Recompute the canonical payload from the server-observed
        // hostname, never trusting a `service` value from the header
        // itself — there is none to trust, since `service` isn't even a
        // header field in the first place.
        let payload = match &fields.resp_did {
            Some(resp_did) => SignedPayload::new_two_way(
                fields.nonce.clone(),
                fields.timestamp.clone(),
                ctx.domain.clone(),
                fields.did.clone(),
                resp_did.clone(),
            ),
            None => SignedPayload::new(fields.nonce.clone(), fields.timestamp.clone(), ctx.domain.clone(), fields.did.clone()),
        };
        let canonical = payload.canonical_json()?;
        key.verify(canonical.as_bytes(), &fields.signature)?;

        let mut result = AuthResult::ok(fields.did.clone());

        if let Some(issuer) = &self.token_issuer {
            if fields.resp_did.is_some() {
                let record = issuer
                    .issue(&fields.did, fields.resp_did.as_deref().unwrap_or_default(), self.config.token_ttl())
                    .await?;
                result = result.with_issued_token(record.token);
            }
        }

        Ok(result)
    }
}

/// `Bearer <token>` — opaque token lookup against a previously issued
/// [`TokenRecord`].
pub struct BearerHandler {
    issuer: Arc<dyn TokenIssuer>,
    cache: Option<Arc<dyn TokenCache>>,
}

impl BearerHandler {
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        BearerHandler { issuer, cache: None }
    }

    pub fn with_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[async_trait]
impl AuthHandler for BearerHandler {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Bearer
    }

    fn can_handle(&self, header: &str) -> bool {
        header_scheme(header) == Some("Bearer")
    }

    async fn build(&self, ctx: &AuthContext, _credentials: &AgentCredentials) -> Result<String, SdkError> {
        let cache = self.cache.as_ref().ok_or_else(|| SdkError::Auth("no token cache configured".into()))?;
        let target = ctx.target_did.as_deref().ok_or_else(|| SdkError::Auth("Bearer build requires target_did".into()))?;
        let record = cache.get(&ctx.caller_did, target).await.ok_or(SdkError::UnknownToken)?;
        if !record.is_valid(Utc::now()) {
            return Err(SdkError::TokenExpired);
        }
        Ok(format!("Bearer {}", record.token))
    }

    async fn verify(&self, header: &str, _ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        let token = header.trim_start_matches("Bearer").trim();
        let record: TokenRecord = self.issuer.validate(token).await?;
        if record.revoked {
            return Err(SdkError::TokenRevoked);
        }
        if !record.is_valid(Utc::now()) {
            return Err(SdkError::TokenExpired);
        }
        Ok(AuthResult::ok(record.caller_did))
    }
}

/// `Token <token>` / `CustomToken <token>` — the extension hook. No
/// default scheme is defined; this handler exists only to
/// recognize the prefix and return a clear `Auth` error rather than
/// falling through to `UnsupportedAuthMethod`, matching the `DIDKey`/`DIDWeb`
/// "reserved, not implemented" treatment.
pub struct CustomTokenHandler;

#[async_trait]
impl AuthHandler for CustomTokenHandler {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Token
    }

    fn can_handle(&self, header: &str) -> bool {
        matches!(header_scheme(header), Some("Token") | Some("CustomToken"))
    }

    async fn build(&self, _ctx: &AuthContext, _credentials: &AgentCredentials) -> Result<String, SdkError> {
        Err(SdkError::Auth("CustomToken is an extension point with no default implementation".into()))
    }

    async fn verify(&self, _header: &str, _ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        Err(SdkError::Auth("CustomToken is an extension point with no default implementation".into()))
    }
}

/// `Session <uuid>` / `SessionID <uuid>` — validates against the session
/// store.
pub struct SessionHandler {
    store: Arc<dyn SessionStore>,
    config: AuthConfig,
}

impl SessionHandler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        SessionHandler { store, config: AuthConfig::default() }
    }

    pub fn with_config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl AuthHandler for SessionHandler {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Session
    }

    fn can_handle(&self, header: &str) -> bool {
        matches!(header_scheme(header), Some("Session") | Some("SessionID"))
    }

    async fn build(&self, ctx: &AuthContext, _credentials: &AgentCredentials) -> Result<String, SdkError> {
        let target = ctx.target_did.as_deref().unwrap_or_default();
        let record = self
            .store
            .create(&ctx.caller_did, target, "DIDWba", self.config.session_ttl())
            .await;
        Ok(format!("Session {}", record.id))
    }

    async fn verify(&self, header: &str, _ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        let raw = header_scheme(header)
            .and_then(|s| header.strip_prefix(s))
            .map(str::trim)
            .unwrap_or_default();
        let id = parse_session_id(raw)?;
        let record = self.store.validate(id).await?;
        Ok(AuthResult::ok(record.caller_did))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use wba_core::crypto::SigningMaterial;
    use wba_core::document::{DidDocument, VerificationMethod, VerificationRef};

    struct FakeResolver {
        documents: HashMap<String, DidDocument>,
    }

    #[async_trait]
    impl DidResolver for FakeResolver {
        async fn resolve(&self, did: &str) -> Result<DidDocument, SdkError> {
            self.documents
                .get(did)
                .cloned()
                .ok_or_else(|| SdkError::Resolution { did: did.into(), reason: "not found in fixture".into() })
        }
    }

    struct FakeTokenIssuer {
        issued: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl TokenIssuer for FakeTokenIssuer {
        async fn issue(&self, caller_did: &str, target_did: &str, ttl: chrono::Duration) -> Result<TokenRecord, SdkError> {
            self.issued.lock().unwrap().push((caller_did.to_string(), target_did.to_string()));
            Ok(TokenRecord {
                token: format!("tok-{caller_did}-{target_did}"),
                caller_did: caller_did.to_string(),
                target_did: target_did.to_string(),
                issued_at: Utc::now(),
                expires_at: Utc::now() + ttl,
                revoked: false,
            })
        }

        async fn validate(&self, _token: &str) -> Result<TokenRecord, SdkError> {
            unimplemented!("not exercised by these tests")
        }

        async fn revoke(&self, _token: &str) -> Result<(), SdkError> {
            unimplemented!("not exercised by these tests")
        }
    }

    fn caller_fixture() -> (AgentCredentials, DidDocument) {
        let did = "did:wba:caller.example%3A9527:wba:user:0000000000000001";
        let signing = SigningMaterial::from_secp256k1_hex(
            "f8c89b32a2fc1d1caf0c4d1aea8f8e6f8a9ebdb5d8bcda6a8a3c0b62470a0f55",
        )
        .unwrap();
        let public_hex = match signing.verifying_key_material() {
            wba_core::crypto::KeyMaterial::Secp256k1(vk) => {
                hex::encode(vk.to_encoded_point(true).as_bytes())
            }
            _ => unreachable!(),
        };
        let creds = AgentCredentials::new(did, format!("{did}#key-1"), signing);
        let document = DidDocument {
            context: vec!["https://www.w3.org/ns/did/v1".into()],
            id: did.into(),
            also_known_as: vec![],
            verification_method: vec![VerificationMethod {
                id: format!("{did}#key-1"),
                type_: "EcdsaSecp256k1VerificationKey2019".into(),
                controller: did.into(),
                public_key_multibase: None,
                public_key_hex: Some(public_hex),
                public_key_jwk: None,
            }],
            authentication: vec![VerificationRef::Id(format!("{did}#key-1"))],
            assertion_method: vec![],
            service: vec![],
        };
        (creds, document)
    }

    fn resolver_with(did: &str, document: DidDocument) -> Arc<FakeResolver> {
        let mut documents = HashMap::new();
        documents.insert(did.to_string(), document);
        Arc::new(FakeResolver { documents })
    }

    #[tokio::test]
    async fn one_way_header_round_trips_through_registry() {
        let (creds, document) = caller_fixture();
        let resolver = resolver_with(&creds.did, document);
        let handler = DidWbaHandler::new(resolver, AuthConfig::default());

        let ctx = AuthContext::new(creds.did.clone(), "http://target.example:9527/wba/user/x/ad.json", "GET");
        let header = handler.build(&ctx, &creds).await.unwrap();

        let result = handler.verify(&header, &ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.caller_did.as_deref(), Some(creds.did.as_str()));
    }

    #[tokio::test]
    async fn two_way_header_carries_resp_did_and_issues_token() {
        let (creds, document) = caller_fixture();
        let resolver = resolver_with(&creds.did, document);
        let issuer = Arc::new(FakeTokenIssuer { issued: Mutex::new(Vec::new()) });
        let handler = DidWbaHandler::new(resolver, AuthConfig::default()).with_token_issuer(issuer.clone());

        let target_did = "did:wba:target.example%3A9527:wba:user:0000000000000002";
        let ctx = AuthContext::new(creds.did.clone(), "http://target.example:9527/agent/api/x/hello", "POST")
            .with_target(target_did);
        let header = handler.build(&ctx, &creds).await.unwrap();
        assert!(header.contains(&format!("resp_did=\"{target_did}\"")));

        let result = handler.verify(&header, &ctx).await.unwrap();
        assert!(result.success);
        assert!(result.issued_token.is_some());
        assert_eq!(issuer.issued.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tampered_nonce_fails_verification() {
        let (creds, document) = caller_fixture();
        let resolver = resolver_with(&creds.did, document);
        let handler = DidWbaHandler::new(resolver, AuthConfig::default());

        let ctx = AuthContext::new(creds.did.clone(), "http://target.example:9527/wba/user/x/ad.json", "GET");
        let header = handler.build(&ctx, &creds).await.unwrap();
        let tampered = header.replacen("nonce=\"", "nonce=\"ff", 1);

        assert!(handler.verify(&tampered, &ctx).await.is_err());
    }

    #[tokio::test]
    async fn unlisted_verification_method_is_rejected() {
        let (creds, mut document) = caller_fixture();
        document.authentication.clear();
        let resolver = resolver_with(&creds.did, document);
        let handler = DidWbaHandler::new(resolver, AuthConfig::default());

        let ctx = AuthContext::new(creds.did.clone(), "http://target.example:9527/wba/user/x/ad.json", "GET");
        let header = handler.build(&ctx, &creds).await.unwrap();

        assert!(handler.verify(&header, &ctx).await.is_err());
    }
}
