//! The identity established once a request's `Authorization` header has
//! been verified, threaded from the auth middleware through to business
//! handlers.

use std::collections::HashMap;

use serde_json::Value;
use wba_core::header::AuthScheme;

/// The request-scoped authentication context, produced per outbound
/// request or reconstructed per inbound request from URL + headers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub caller_did: String,
    pub target_did: Option<String>,
    pub request_url: String,
    pub method: String,
    pub use_two_way_auth: bool,
    /// The bare hostname `request_url` resolves to.
    pub domain: String,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub custom_headers: HashMap<String, String>,
    pub json_data: Option<Value>,
}

impl AuthContext {
    pub fn new(caller_did: impl Into<String>, request_url: impl Into<String>, method: impl Into<String>) -> Self {
        let request_url = request_url.into();
        let domain = extract_hostname(&request_url);
        AuthContext {
            caller_did: caller_did.into(),
            target_did: None,
            request_url,
            method: method.into(),
            use_two_way_auth: false,
            domain,
            timestamp: None,
            nonce: None,
            custom_headers: HashMap::new(),
            json_data: None,
        }
    }

    pub fn with_target(mut self, target_did: impl Into<String>) -> Self {
        self.target_did = Some(target_did.into());
        self.use_two_way_auth = true;
        self
    }
}

/// Extracts the bare hostname (no scheme, no port) from a request URL, the
/// value signed as the payload's `service` field.
pub fn extract_hostname(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// The verified outcome of authenticating one inbound request.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// The DID of the party making the request.
    pub caller_did: String,
    /// The DID the request was addressed to (the local agent/service).
    pub target_did: String,
    pub scheme: AuthScheme,
    /// The bearer token issued for this (caller, target) pair, present
    /// whenever the middleware minted or reused one.
    pub token: Option<String>,
    /// The session id, present only when resolved via a `Session` header.
    pub session_id: Option<String>,
}

impl VerifiedIdentity {
    pub fn new(caller_did: impl Into<String>, target_did: impl Into<String>, scheme: AuthScheme) -> Self {
        VerifiedIdentity {
            caller_did: caller_did.into(),
            target_did: target_did.into(),
            scheme,
            token: None,
            session_id: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
