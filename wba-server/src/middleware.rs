//! The authorization middleware: exempt-path bypass, target DID
//! inference, hosted-DID rejection, dispatch through the
//! [`wba_sdk::registry::HandlerRegistry`], and reciprocal-header
//! attachment on a successful two-way exchange — grounded on
//! `URLDIDFormatHandler`/`verify_auth_header` and on
//! `axum::middleware::from_fn_with_state` layering.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use wba_core::did::WbaDid;
use wba_framework::BEARER_TOKEN_HEADER;
use wba_sdk::context::{AuthContext, extract_hostname};

use crate::error::RoutingError;
use crate::state::AppState;

/// The verified identity of an authenticated request, attached to the
/// request's extensions for downstream handlers to read.
#[derive(Debug, Clone)]
pub struct VerifiedCaller {
    pub caller_did: String,
    pub target_did: String,
}

pub async fn auth_middleware(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if state.is_exempt(&path) {
        return next.run(request).await;
    }

    let query: HashMap<String, String> = request
        .uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let host_header = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let target_did = match infer_target_did(&path, query.get("resp_did").map(String::as_str), host_header.as_deref()) {
        Some(did) => did,
        None => return RoutingError::CannotInferTarget.into_response(),
    };

    // Hosted DIDs are refused before any crypto check: this core never
    // acts on behalf of a DID it only publishes a document for.
    if is_hosted_did(&target_did) {
        return RoutingError::HostedDidRejected.into_response();
    }

    let auth_header = match request.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(h) => h.to_string(),
        None => return RoutingError::Auth(wba_sdk::error::SdkError::Auth("missing Authorization header".into())).into_response(),
    };

    let request_url = format!("http://{}{}", host_header.as_deref().unwrap_or(""), request.uri());
    let caller_hint = query.get("req_did").cloned().unwrap_or_default();
    let mut ctx = AuthContext::new(caller_hint, request_url.clone(), request.method().to_string()).with_target(target_did.clone());
    ctx.domain = extract_hostname(&request_url);

    let auth_result = match state.handlers.verify(&auth_header, &ctx).await {
        Ok(result) => result,
        Err(e) => return RoutingError::Auth(e).into_response(),
    };
    let caller_did = auth_result.caller_did.unwrap_or(ctx.caller_did.clone());

    if let Some(agent) = state.agents.get(&target_did) {
        agent.contacts.record_interaction(&caller_did, &ctx.domain, None);
    }

    let mut request = request;
    request.extensions_mut().insert(VerifiedCaller {
        caller_did: caller_did.clone(),
        target_did: target_did.clone(),
    });

    let mut response = next.run(request).await;

    // Two-way exchange: mint the reciprocal `DIDWba` reply header with the
    // target agent's own credentials, plus the side-channel bearer-token
    // header if the verify step issued one.
    let is_did_wba = auth_header.trim_start().starts_with("DIDWba");
    if is_did_wba {
        if let Some(agent) = state.agents.get(&target_did) {
            let reply_ctx = AuthContext::new(target_did.clone(), request_url, ctx.method.clone()).with_target(caller_did.clone());
            if let Ok(reply_header) = state.handlers.build(&auth_header, &reply_ctx, &agent.credentials).await {
                if let Ok(value) = HeaderValue::from_str(&reply_header) {
                    response.headers_mut().insert(header::AUTHORIZATION, value);
                }
                if let Some(token) = auth_result.issued_token {
                    if let Ok(value) = HeaderValue::from_str(&token) {
                        response.headers_mut().insert(BEARER_TOKEN_HEADER, value);
                    }
                }
            }
        }
    }

    response
}

/// Whether `did` names a hosted (not actively served) agent, i.e. its
/// `did:wba:<host>:wba:hostuser:<id>` type segment is `hostuser`.
fn is_hosted_did(did: &str) -> bool {
    WbaDid::parse(did).map(|d| d.path_segments.iter().any(|s| s == "hostuser")).unwrap_or(false)
}

/// Determines which local agent a request is addressed to: an explicit
/// `resp_did` query parameter wins; otherwise the
/// URL path is analyzed for either an embedded, percent-encoded DID or a
/// bare 16-hex local id to reconstruct against the observed `Host` header.
pub fn infer_target_did(path: &str, resp_did_param: Option<&str>, host_header: Option<&str>) -> Option<String> {
    // `resp_did_param` has already passed through `url::form_urlencoded::parse`
    // in the caller, which fully decodes the query value; decoding it again
    // here would mangle a DID whose own `%3A` host/port separator survived
    // that first pass (it would collapse to a literal `:`, reshuffling the
    // segments `WbaDid::parse` expects).
    if let Some(explicit) = resp_did_param {
        if !explicit.is_empty() {
            return Some(explicit.to_string());
        }
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 3 && segments[0] == "wba" && (segments[1] == "user" || segments[1] == "hostuser") {
        return reconstruct_or_decode(segments[2], segments[1], host_header);
    }
    if segments.len() >= 3 && segments[0] == "agent" {
        return reconstruct_or_decode(segments[2], "user", host_header);
    }
    None
}

fn reconstruct_or_decode(raw: &str, type_segment: &str, host_header: Option<&str>) -> Option<String> {
    let decoded = percent_decode(raw);
    if decoded.starts_with("did:wba:") {
        return Some(decoded);
    }
    if is_hex16(raw) {
        let host = host_header?;
        return Some(format!("did:wba:{}:wba:{type_segment}:{raw}", encode_authority(host)));
    }
    None
}

fn is_hex16(s: &str) -> bool {
    s.len() == 16 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn encode_authority(host: &str) -> String {
    host.replacen(':', "%3A", 1)
}

/// Minimal percent-decoder: a single DID path segment is a narrow enough
/// surface that pulling in a dedicated crate isn't warranted.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            if let Ok(byte) = u8::from_str_radix(std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""), 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resp_did_query_param_wins_over_the_path() {
        let target = infer_target_did(
            "/agent/api/0000000000000000/hello",
            Some("did:wba:override.example:wba:agent:1111111111111111"),
            Some("example.com"),
        );
        assert_eq!(target.as_deref(), Some("did:wba:override.example:wba:agent:1111111111111111"));
    }

    #[test]
    fn reconstructs_from_a_bare_local_id_and_host_header() {
        let target = infer_target_did("/agent/api/0123456789abcdef/hello", None, Some("example.com:9000"));
        assert_eq!(target.as_deref(), Some("did:wba:example.com%3A9000:wba:user:0123456789abcdef"));
    }

    #[test]
    fn decodes_an_embedded_percent_encoded_did_in_the_path() {
        let encoded = "did%3Awba%3Aexample.com%3Awba%3Aagent%3A0123456789abcdef";
        let target = infer_target_did(&format!("/agent/api/{encoded}/hello"), None, Some("example.com"));
        assert_eq!(target.as_deref(), Some("did:wba:example.com:wba:agent:0123456789abcdef"));
    }

    #[test]
    fn unrecognized_paths_cannot_infer_a_target() {
        assert!(infer_target_did("/healthz", None, Some("example.com")).is_none());
    }

    #[test]
    fn hostuser_type_segment_is_detected_as_hosted() {
        assert!(is_hosted_did("did:wba:example.com:wba:hostuser:0123456789abcdef"));
        assert!(!is_hosted_did("did:wba:example.com:wba:user:0123456789abcdef"));
    }
}
