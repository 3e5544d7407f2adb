//! Dispatch by `Authorization` header prefix, mirroring a dyn-dispatch-
//! over-registry pattern (`anda_core::agent`'s `AgentSet`/`AgentDyn`):
//! concrete handler types are adapted to one dyn trait and collected into
//! a registry keyed by scheme, first-match wins.

use std::sync::Arc;

use async_trait::async_trait;
use wba_core::header::{AuthScheme, ParsedAuthorization, parse_authorization};

use crate::context::AuthContext;
use crate::credentials::AgentCredentials;
use crate::error::SdkError;

/// The outcome of verifying an inbound `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub success: bool,
    pub message: String,
    /// The caller DID recovered from the header, once verified.
    pub caller_did: Option<String>,
    /// A reciprocal header to attach to the response, for two-way schemes
    /// that issue one.
    pub reply_header: Option<String>,
    /// A freshly issued bearer token, for two-way schemes that mint one.
    pub issued_token: Option<String>,
    /// A freshly created session id, set by [`crate::session::SessionAwareAuthManager`]
    /// after a successful non-`Session` verification.
    pub session_id: Option<uuid::Uuid>,
}

impl AuthResult {
    pub fn ok(caller_did: impl Into<String>) -> Self {
        AuthResult {
            success: true,
            message: "ok".into(),
            caller_did: Some(caller_did.into()),
            reply_header: None,
            issued_token: None,
            session_id: None,
        }
    }

    pub fn with_reply_header(mut self, header: impl Into<String>) -> Self {
        self.reply_header = Some(header.into());
        self
    }

    pub fn with_issued_token(mut self, token: impl Into<String>) -> Self {
        self.issued_token = Some(token.into());
        self
    }

    pub fn with_session_id(mut self, id: uuid::Uuid) -> Self {
        self.session_id = Some(id);
        self
    }
}

/// One Authorization scheme's verify/build logic. Each handler
/// recognizes a header by [`can_handle`] and either builds an
/// outbound header or verifies an inbound one.
#[async_trait]
pub trait AuthHandler: Send + Sync {
    fn scheme(&self) -> AuthScheme;

    fn can_handle(&self, header: &str) -> bool;

    /// Builds an outbound `Authorization` header value for `ctx`, signing
    /// with `credentials` when the scheme requires a signature.
    async fn build(&self, ctx: &AuthContext, credentials: &AgentCredentials) -> Result<String, SdkError>;

    /// Verifies an inbound `Authorization` header, given the request
    /// context it was attached to (target DID, observed hostname, etc).
    async fn verify(&self, header: &str, ctx: &AuthContext) -> Result<AuthResult, SdkError>;
}

/// First-match registry of [`AuthHandler`]s, one per recognized scheme
/// prefix.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn AuthHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry { handlers: Vec::new() }
    }

    pub fn register(mut self, handler: Arc<dyn AuthHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Returns the first registered handler whose [`AuthHandler::can_handle`]
    /// accepts `header`.
    pub fn dispatch(&self, header: &str) -> Result<Arc<dyn AuthHandler>, SdkError> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(header))
            .cloned()
            .ok_or_else(|| SdkError::Auth("unsupported auth scheme".into()))
    }

    pub async fn verify(&self, header: &str, ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        let handler = self.dispatch(header)?;
        handler.verify(header, ctx).await
    }

    pub async fn build(&self, header: &str, ctx: &AuthContext, credentials: &AgentCredentials) -> Result<String, SdkError> {
        let handler = self.dispatch(header)?;
        handler.build(ctx, credentials).await
    }
}

/// Common surface of [`HandlerRegistry`] and
/// [`crate::session::SessionAwareAuthManager`], so `wba-server` can hold
/// whichever one the runtime wires up behind a single `Arc<dyn
/// AuthDispatch>` in its shared state.
#[async_trait]
pub trait AuthDispatch: Send + Sync {
    async fn verify(&self, header: &str, ctx: &AuthContext) -> Result<AuthResult, SdkError>;
    async fn build(&self, header: &str, ctx: &AuthContext, credentials: &AgentCredentials) -> Result<String, SdkError>;
}

#[async_trait]
impl AuthDispatch for HandlerRegistry {
    async fn verify(&self, header: &str, ctx: &AuthContext) -> Result<AuthResult, SdkError> {
        HandlerRegistry::verify(self, header, ctx).await
    }

    async fn build(&self, header: &str, ctx: &AuthContext, credentials: &AgentCredentials) -> Result<String, SdkError> {
        HandlerRegistry::build(self, header, ctx, credentials).await
    }
}

/// Cheap prefix check shared by the built-in handlers (scheme name
/// followed by at least one space).
pub fn header_scheme(header: &str) -> Option<&str> {
    header.split_once(char::is_whitespace).map(|(s, _)| s)
}

/// Parses `header` and confirms it decodes to `scheme` without losing the
/// handler-specific parse error.
pub fn parse_as(header: &str, scheme: AuthScheme) -> Result<ParsedAuthorization, SdkError> {
    let parsed = parse_authorization(header).map_err(SdkError::Protocol)?;
    if parsed.scheme() != scheme {
        return Err(SdkError::Auth(format!("expected {scheme:?} scheme")));
    }
    Ok(parsed)
}
