//! The canonical signed payload: a JSON object canonicalized per RFC 8785
//! (JCS) and hashed with SHA-256 before signing, grounded on
//! `anp_open_sdk/protocol/authentication/did_wba.py`'s payload construction
//! ahead of `sign_payload`/`verify_signature`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProtocolError;

#[derive(Debug, Clone, Serialize)]
pub struct SignedPayload {
    pub nonce: String,
    pub timestamp: String,
    pub service: String,
    pub did: String,
    /// Present iff the exchange is two-way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_did: Option<String>,
}

impl SignedPayload {
    pub fn new(nonce: impl Into<String>, timestamp: impl Into<String>, service: impl Into<String>, did: impl Into<String>) -> Self {
        SignedPayload {
            nonce: nonce.into(),
            timestamp: timestamp.into(),
            service: service.into(),
            did: did.into(),
            resp_did: None,
        }
    }

    /// Builds a two-way payload carrying the target's DID as `resp_did`.
    pub fn new_two_way(
        nonce: impl Into<String>,
        timestamp: impl Into<String>,
        service: impl Into<String>,
        did: impl Into<String>,
        resp_did: impl Into<String>,
    ) -> Self {
        SignedPayload {
            resp_did: Some(resp_did.into()),
            ..Self::new(nonce, timestamp, service, did)
        }
    }

    /// Canonicalizes this payload with JCS. The resulting bytes are the
    /// exact message signed and verified — secp256k1 signing hashes them
    /// with SHA-256 internally (via `k256`'s `Signer` impl); Ed25519 signs
    /// them directly with no separate pre-hash step.
    pub fn canonical_json(&self) -> Result<String, ProtocolError> {
        canonicalize(self)
    }
}

/// Canonicalizes any serializable value with RFC 8785 JCS.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    serde_jcs::to_string(value).map_err(|e| ProtocolError::Canonicalization(e.to_string()))
}

/// Builds the object map used when the payload must be merged with
/// additional response-side fields (e.g. the server's reciprocal
/// signature payload, which echoes the client's nonce).
pub fn to_value(payload: &SignedPayload) -> Result<Map<String, Value>, ProtocolError> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ProtocolError::Canonicalization("payload is not an object".into())),
        Err(e) => Err(ProtocolError::Canonicalization(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_is_key_sorted() {
        let payload = SignedPayload::new("n1", "2024-01-01T00:00:00Z", "example.com", "did:wba:example.com:wba:agent:0123456789abcdef");
        let json = payload.canonical_json().unwrap();
        let did_idx = json.find("\"did\"").unwrap();
        let nonce_idx = json.find("\"nonce\"").unwrap();
        assert!(did_idx < nonce_idx, "JCS must sort object keys lexicographically");
    }

    #[test]
    fn resp_did_present_only_for_two_way() {
        let one_way = SignedPayload::new("n1", "2024-01-01T00:00:00Z", "example.com", "did:wba:example.com:wba:agent:0123456789abcdef");
        assert!(!one_way.canonical_json().unwrap().contains("resp_did"));

        let two_way = SignedPayload::new_two_way(
            "n1",
            "2024-01-01T00:00:00Z",
            "example.com",
            "did:wba:example.com:wba:agent:0123456789abcdef",
            "did:wba:target.com:wba:agent:fedcba9876543210",
        );
        assert!(two_way.canonical_json().unwrap().contains("\"resp_did\":\"did:wba:target.com:wba:agent:fedcba9876543210\""));
    }

    #[test]
    fn canonical_json_is_deterministic() {
        let payload = SignedPayload::new("n1", "2024-01-01T00:00:00Z", "example.com", "did:wba:example.com:wba:agent:0123456789abcdef");
        assert_eq!(payload.canonical_json().unwrap(), payload.canonical_json().unwrap());
    }
}
