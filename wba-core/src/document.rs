//! DID document types and public-key extraction.

use serde::{Deserialize, Serialize};

use crate::crypto::KeyMaterial;
use crate::error::ProtocolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_known_as: Vec<String>,
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default)]
    pub authentication: Vec<VerificationRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<VerificationRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceEndpoint>,
}

/// A verification method reference: either an inline id string or an
/// embedded verification method object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerificationRef {
    Id(String),
    Embedded(Box<VerificationMethod>),
}

impl VerificationRef {
    pub fn id(&self) -> &str {
        match self {
            VerificationRef::Id(id) => id,
            VerificationRef::Embedded(vm) => &vm.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub service_endpoint: String,
}

impl DidDocument {
    /// Looks up a verification method by its fragment (`#keys-1`) or full id,
    /// and decodes its embedded public key into [`KeyMaterial`].
    pub fn resolve_verification_method(
        &self,
        method_ref: &str,
    ) -> Result<&VerificationMethod, ProtocolError> {
        let wanted = strip_to_fragment(method_ref);
        self.verification_method
            .iter()
            .find(|vm| strip_to_fragment(&vm.id) == wanted || vm.id == method_ref)
            .ok_or_else(|| {
                ProtocolError::MissingField("verificationMethod matching Authorization header")
            })
    }

    /// The verification method used for the `authentication` relationship,
    /// defaulting to the first entry when the header omits a `keyid`.
    pub fn authentication_method(
        &self,
        keyid: Option<&str>,
    ) -> Result<&VerificationMethod, ProtocolError> {
        let target = match keyid {
            Some(k) => k.to_string(),
            None => self
                .authentication
                .first()
                .map(|r| r.id().to_string())
                .ok_or_else(|| ProtocolError::MissingField("authentication"))?,
        };
        self.resolve_verification_method(&target)
    }
}

impl VerificationMethod {
    /// Decodes this verification method's public key, trying
    /// `publicKeyMultibase`, `publicKeyHex`, then `publicKeyJwk` in turn.
    pub fn key_material(&self) -> Result<KeyMaterial, ProtocolError> {
        if let Some(mb) = &self.public_key_multibase {
            return KeyMaterial::from_multibase(mb)
                .map_err(|e| ProtocolError::MalformedHeader(e.to_string()));
        }
        if let Some(hex_key) = &self.public_key_hex {
            return KeyMaterial::from_hex(hex_key)
                .map_err(|e| ProtocolError::MalformedHeader(e.to_string()));
        }
        if let Some(jwk) = &self.public_key_jwk {
            return key_material_from_jwk(jwk);
        }
        Err(ProtocolError::MissingField(
            "publicKeyMultibase, publicKeyHex or publicKeyJwk",
        ))
    }
}

/// Decodes a `{kty: "EC", crv: "secp256k1", x, y}` JWK into an
/// uncompressed 65-byte (`0x04 || x || y`) secp256k1 public key.
fn key_material_from_jwk(jwk: &serde_json::Value) -> Result<KeyMaterial, ProtocolError> {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let kty = jwk.get("kty").and_then(|v| v.as_str()).unwrap_or_default();
    let crv = jwk.get("crv").and_then(|v| v.as_str()).unwrap_or_default();
    if kty != "EC" || crv != "secp256k1" {
        return Err(ProtocolError::MalformedHeader(format!(
            "unsupported JWK kty/crv: {kty}/{crv}"
        )));
    }
    let x = jwk
        .get("x")
        .and_then(|v| v.as_str())
        .ok_or(ProtocolError::MissingField("jwk.x"))?;
    let y = jwk
        .get("y")
        .and_then(|v| v.as_str())
        .ok_or(ProtocolError::MissingField("jwk.y"))?;
    let x = URL_SAFE_NO_PAD
        .decode(x)
        .map_err(|e| ProtocolError::MalformedHeader(format!("invalid jwk.x: {e}")))?;
    let y = URL_SAFE_NO_PAD
        .decode(y)
        .map_err(|e| ProtocolError::MalformedHeader(format!("invalid jwk.y: {e}")))?;

    let mut bytes = Vec::with_capacity(1 + x.len() + y.len());
    bytes.push(0x04);
    bytes.extend_from_slice(&x);
    bytes.extend_from_slice(&y);
    KeyMaterial::from_uncompressed(&bytes).map_err(|e| ProtocolError::MalformedHeader(e.to_string()))
}

fn strip_to_fragment(id: &str) -> &str {
    id.rsplit_once('#').map(|(_, frag)| frag).unwrap_or(id)
}
