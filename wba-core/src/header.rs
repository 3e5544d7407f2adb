//! Parsing and building of the `Authorization` header for all four schemes
//! supported by the protocol: `DIDWba`, `Bearer`, `Token`/`CustomToken`,
//! and `Session`/`SessionID`. Grounded on
//! `DIDWbaAuthHeader.build_auth_header` / `parse_auth_header` in
//! `anp_open_sdk/protocol/authentication/did_wba.py`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use crate::error::ProtocolError;
use crate::payload::SignedPayload;

/// Generates a fresh random nonce for a `DIDWba` header, as 32 lowercase
/// hex characters (16 random bytes), matching the entropy of the nonce
/// produced by the original `build_auth_header`.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Verifies that `timestamp` (RFC 3339) falls within `window` of `now`,
/// rejecting both stale and clock-skewed-into-the-future headers.
pub fn verify_timestamp_window(
    timestamp: &str,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<(), ProtocolError> {
    let ts = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| ProtocolError::TimestampOutOfWindow(format!("unparseable timestamp: {e}")))?
        .with_timezone(&Utc);
    let delta = now - ts;
    if delta > window || delta < -window {
        return Err(ProtocolError::TimestampOutOfWindow(format!(
            "timestamp {timestamp} outside allowed window of {window}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    DidWba,
    Bearer,
    Token,
    Session,
}

/// A parsed `DIDWba ...` header: DID, verification method id, and the
/// fields of the signed payload plus the detached signature.
#[derive(Debug, Clone)]
pub struct DidWbaHeader {
    pub did: String,
    pub nonce: String,
    pub timestamp: String,
    pub resp_did: Option<String>,
    pub verification_method: Option<String>,
    pub signature: String,
}

/// The outcome of parsing an `Authorization` header: which scheme it used
/// and the scheme-specific credential.
#[derive(Debug, Clone)]
pub enum ParsedAuthorization {
    DidWba(DidWbaHeader),
    Bearer(String),
    Token(String),
    Session(String),
}

impl ParsedAuthorization {
    pub fn scheme(&self) -> AuthScheme {
        match self {
            ParsedAuthorization::DidWba(_) => AuthScheme::DidWba,
            ParsedAuthorization::Bearer(_) => AuthScheme::Bearer,
            ParsedAuthorization::Token(_) => AuthScheme::Token,
            ParsedAuthorization::Session(_) => AuthScheme::Session,
        }
    }
}

/// Parses the raw value of an `Authorization` header (without the header
/// name) into one of the four supported schemes.
pub fn parse_authorization(raw: &str) -> Result<ParsedAuthorization, ProtocolError> {
    let raw = raw.trim();
    let (scheme, rest) = raw
        .split_once(char::is_whitespace)
        .ok_or_else(|| ProtocolError::MalformedHeader("missing auth scheme".into()))?;
    let rest = rest.trim();

    match scheme {
        "DIDWba" => parse_did_wba(rest).map(ParsedAuthorization::DidWba),
        "Bearer" => Ok(ParsedAuthorization::Bearer(rest.to_string())),
        "Token" | "CustomToken" => Ok(ParsedAuthorization::Token(rest.to_string())),
        "Session" | "SessionID" => Ok(ParsedAuthorization::Session(rest.to_string())),
        other => Err(ProtocolError::MalformedHeader(format!(
            "unsupported auth scheme: {other}"
        ))),
    }
}

/// Builds the `DIDWba ...` header value from the signed payload and the
/// resulting base64url signature.
pub fn build_did_wba_header(
    payload: &SignedPayload,
    verification_method: Option<&str>,
    signature: &str,
) -> String {
    let mut fields = vec![
        format!("did=\"{}\"", payload.did),
        format!("nonce=\"{}\"", payload.nonce),
        format!("timestamp=\"{}\"", payload.timestamp),
    ];
    if let Some(resp_did) = &payload.resp_did {
        fields.push(format!("resp_did=\"{resp_did}\""));
    }
    if let Some(vm) = verification_method {
        fields.push(format!("verification_method=\"{vm}\""));
    }
    fields.push(format!("signature=\"{signature}\""));
    format!("DIDWba {}", fields.join(", "))
}

fn parse_did_wba(rest: &str) -> Result<DidWbaHeader, ProtocolError> {
    let fields = parse_comma_separated_fields(rest)?;

    let get = |name: &'static str| -> Result<String, ProtocolError> {
        fields
            .get(name)
            .cloned()
            .ok_or(ProtocolError::MissingField(name))
    };

    Ok(DidWbaHeader {
        did: get("did")?,
        nonce: get("nonce")?,
        timestamp: get("timestamp")?,
        resp_did: fields.get("resp_did").cloned(),
        verification_method: fields.get("verification_method").cloned(),
        signature: get("signature")?,
    })
}

/// Parses `key="value", key2="value2"` field lists used by the `DIDWba`
/// scheme, tolerating optional whitespace around commas.
fn parse_comma_separated_fields(rest: &str) -> Result<HashMap<String, String>, ProtocolError> {
    let mut fields = HashMap::new();
    for part in split_top_level_commas(rest) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').ok_or_else(|| {
            ProtocolError::MalformedHeader(format!("malformed field: {part}"))
        })?;
        let value = value.trim().trim_matches('"');
        fields.insert(key.trim().to_string(), value.to_string());
    }
    Ok(fields)
}

fn split_top_level_commas(rest: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&rest[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&rest[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_did_wba_header() {
        let raw = r#"DIDWba did="did:wba:example.com:wba:agent:0123456789abcdef", nonce="abc123", timestamp="2024-01-01T00:00:00Z", verification_method="#keys-1", signature="c2ln""#;
        let parsed = parse_authorization(raw).unwrap();
        match parsed {
            ParsedAuthorization::DidWba(h) => {
                assert_eq!(h.did, "did:wba:example.com:wba:agent:0123456789abcdef");
                assert_eq!(h.nonce, "abc123");
                assert_eq!(h.verification_method.as_deref(), Some("#keys-1"));
                assert_eq!(h.signature, "c2ln");
            }
            other => panic!("expected DidWba, got {other:?}"),
        }
    }

    #[test]
    fn parses_bearer() {
        match parse_authorization("Bearer abc.def.ghi").unwrap() {
            ParsedAuthorization::Bearer(tok) => assert_eq!(tok, "abc.def.ghi"),
            other => panic!("expected Bearer, got {other:?}"),
        }
    }

    #[test]
    fn parses_custom_token_and_session() {
        assert!(matches!(
            parse_authorization("CustomToken xyz").unwrap(),
            ParsedAuthorization::Token(t) if t == "xyz"
        ));
        assert!(matches!(
            parse_authorization("SessionID 11111111-1111-1111-1111-111111111111").unwrap(),
            ParsedAuthorization::Session(_)
        ));
    }

    #[test]
    fn round_trips_build_and_parse() {
        let payload = SignedPayload::new(
            "n1",
            "2024-01-01T00:00:00Z",
            "example.com",
            "did:wba:example.com:wba:agent:0123456789abcdef",
        );
        let header = build_did_wba_header(&payload, Some("#keys-1"), "c2ln");
        match parse_authorization(&header).unwrap() {
            ParsedAuthorization::DidWba(h) => {
                assert_eq!(h.did, payload.did);
                assert_eq!(h.nonce, payload.nonce);
                assert!(h.resp_did.is_none());
            }
            other => panic!("expected DidWba, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_two_way_resp_did() {
        let payload = SignedPayload::new_two_way(
            "n1",
            "2024-01-01T00:00:00Z",
            "example.com",
            "did:wba:example.com:wba:agent:0123456789abcdef",
            "did:wba:target.com:wba:agent:fedcba9876543210",
        );
        let header = build_did_wba_header(&payload, Some("#keys-1"), "c2ln");
        match parse_authorization(&header).unwrap() {
            ParsedAuthorization::DidWba(h) => {
                assert_eq!(h.resp_did.as_deref(), Some("did:wba:target.com:wba:agent:fedcba9876543210"));
            }
            other => panic!("expected DidWba, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse_authorization("Basic dXNlcjpwYXNz").is_err());
    }

    #[test]
    fn nonce_is_32_hex_chars() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn timestamp_window_accepts_recent_and_rejects_stale() {
        let now = Utc::now();
        let recent = (now - Duration::seconds(10)).to_rfc3339();
        assert!(verify_timestamp_window(&recent, now, Duration::seconds(300)).is_ok());

        let stale = (now - Duration::seconds(600)).to_rfc3339();
        assert!(verify_timestamp_window(&stale, now, Duration::seconds(300)).is_err());
    }
}
