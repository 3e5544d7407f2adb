//! An agent's own DID identity and signing key, used to produce outgoing
//! `DIDWba` headers.

use wba_core::crypto::SigningMaterial;
use wba_core::header::{build_did_wba_header, generate_nonce};
use wba_core::payload::SignedPayload;

use crate::error::SdkError;

#[derive(Clone)]
pub struct AgentCredentials {
    pub did: String,
    pub verification_method_id: String,
    pub signing_key: SigningMaterial,
}

impl AgentCredentials {
    pub fn new(did: impl Into<String>, verification_method_id: impl Into<String>, signing_key: SigningMaterial) -> Self {
        AgentCredentials {
            did: did.into(),
            verification_method_id: verification_method_id.into(),
            signing_key,
        }
    }

    /// Builds a fresh, signed one-way `DIDWba` Authorization header value
    /// for a request addressed to `service` (the target's bare hostname).
    pub fn build_auth_header(&self, service: &str, timestamp: chrono::DateTime<chrono::Utc>) -> Result<String, SdkError> {
        let payload = SignedPayload::new(
            generate_nonce(),
            timestamp.to_rfc3339(),
            service.to_string(),
            self.did.clone(),
        );
        self.sign_and_build(payload)
    }

    /// Builds a fresh, signed two-way `DIDWba` Authorization header,
    /// naming `resp_did` as the target this agent expects a reciprocal
    /// header from.
    pub fn build_auth_header_two_way(
        &self,
        service: &str,
        resp_did: &str,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Result<String, SdkError> {
        let payload = SignedPayload::new_two_way(
            generate_nonce(),
            timestamp.to_rfc3339(),
            service.to_string(),
            self.did.clone(),
            resp_did.to_string(),
        );
        self.sign_and_build(payload)
    }

    fn sign_and_build(&self, payload: SignedPayload) -> Result<String, SdkError> {
        let canonical = payload.canonical_json()?;
        let signature = self.signing_key.sign(canonical.as_bytes());
        Ok(build_did_wba_header(
            &payload,
            Some(&self.verification_method_id),
            &signature,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn builds_parseable_header() {
        let signing = SigningMaterial::from_ed25519_bytes(&[3u8; 32]).unwrap();
        let creds = AgentCredentials::new(
            "did:wba:example.com:wba:agent:0123456789abcdef",
            "did:wba:example.com:wba:agent:0123456789abcdef#keys-1",
            signing,
        );
        let header = creds.build_auth_header("target.example.com", Utc::now()).unwrap();
        let parsed = wba_core::header::parse_authorization(&header).unwrap();
        assert!(matches!(parsed, wba_core::header::ParsedAuthorization::DidWba(_)));
    }
}
