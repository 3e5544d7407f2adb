//! Signing and verification for the two supported key types.
//!
//! Grounded on `anp_open_sdk/protocol/crypto.py` (`CryptoSigner`,
//! `Secp256k1Signer`, `Ed25519Signer`, `SignatureEncoder`): secp256k1 keys
//! sign with ECDSA and produce a DER signature internally, which is then
//! converted to a fixed 64-byte `R || S` encoding for the wire; Ed25519
//! keys sign raw 64-byte signatures directly. Both are transported as
//! unpadded base64url.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_consensus::{Signature as EdSignature, SigningKey as EdSigningKey, VerificationKey as EdVerifyingKey};
use k256::ecdsa::signature::{Signer as _, Verifier as _};
use k256::ecdsa::{Signature as K256Signature, SigningKey as K256SigningKey, VerifyingKey as K256VerifyingKey};

use crate::error::CryptoError;

const SECP256K1_COMPRESSED_LEN: usize = 33;
const SECP256K1_UNCOMPRESSED_LEN: usize = 65;
const ED25519_KEY_LEN: usize = 32;
const RS_SIGNATURE_LEN: usize = 64;

/// The decoded public key material for a verification method, dispatched
/// by key length exactly as the original `verify_signature` does.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    Secp256k1(K256VerifyingKey),
    Ed25519(EdVerifyingKey),
}

/// The decoded private key material used by the signing client.
#[derive(Clone)]
pub enum SigningMaterial {
    Secp256k1(K256SigningKey),
    Ed25519(EdSigningKey),
}

impl KeyMaterial {
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| CryptoError::MalformedSignature(format!("invalid hex key: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Decodes a multibase (`z`-prefixed base58btc) key, stripping a
    /// multicodec varint prefix when present (`0xe7 0x01` for
    /// secp256k1-pub, `0xed 0x01` for ed25519-pub), matching the `did:key`
    /// convention used across the pack for multibase-encoded keys.
    pub fn from_multibase(multibase: &str) -> Result<Self, CryptoError> {
        let body = multibase
            .strip_prefix('z')
            .ok_or_else(|| CryptoError::MalformedSignature("expected base58btc multibase 'z' prefix".into()))?;
        let decoded = bs58::decode(body)
            .into_vec()
            .map_err(|e| CryptoError::MalformedSignature(format!("invalid base58: {e}")))?;

        let stripped = match decoded.as_slice() {
            [0xe7, 0x01, rest @ ..] => rest,
            [0xed, 0x01, rest @ ..] => rest,
            other => other,
        };
        Self::from_bytes(stripped)
    }

    /// Decodes an uncompressed (65-byte, `0x04`-prefixed) secp256k1 public
    /// key, as produced from a `publicKeyJwk`'s concatenated `x`/`y`.
    pub fn from_uncompressed(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SECP256K1_UNCOMPRESSED_LEN || bytes[0] != 0x04 {
            return Err(CryptoError::UnsupportedKeyLength(bytes.len()));
        }
        let key = K256VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
        Ok(KeyMaterial::Secp256k1(key))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.len() {
            SECP256K1_COMPRESSED_LEN => {
                let key = K256VerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
                Ok(KeyMaterial::Secp256k1(key))
            }
            SECP256K1_UNCOMPRESSED_LEN if bytes[0] == 0x04 => {
                let key = K256VerifyingKey::from_sec1_bytes(bytes)
                    .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
                Ok(KeyMaterial::Secp256k1(key))
            }
            ED25519_KEY_LEN => {
                let arr: [u8; ED25519_KEY_LEN] = bytes
                    .try_into()
                    .map_err(|_| CryptoError::UnsupportedKeyLength(bytes.len()))?;
                let key = EdVerifyingKey::try_from(arr)
                    .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
                Ok(KeyMaterial::Ed25519(key))
            }
            other => Err(CryptoError::UnsupportedKeyLength(other)),
        }
    }

    /// Verifies a base64url-encoded, wire-format signature over `message`.
    pub fn verify(&self, message: &[u8], signature_b64url: &str) -> Result<(), CryptoError> {
        let sig_bytes = decode_base64url(signature_b64url)?;
        match self {
            KeyMaterial::Secp256k1(vk) => {
                if sig_bytes.len() != RS_SIGNATURE_LEN {
                    return Err(CryptoError::MalformedSignature(format!(
                        "expected {RS_SIGNATURE_LEN}-byte R||S signature, got {}",
                        sig_bytes.len()
                    )));
                }
                let sig = K256Signature::from_slice(&sig_bytes)
                    .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
                vk.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            KeyMaterial::Ed25519(vk) => {
                let arr: [u8; RS_SIGNATURE_LEN] = sig_bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| CryptoError::MalformedSignature("expected 64-byte signature".into()))?;
                let sig = EdSignature::from(arr);
                vk.verify(&sig, message)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
        }
    }
}

impl SigningMaterial {
    pub fn from_secp256k1_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| CryptoError::MalformedSignature(format!("invalid hex key: {e}")))?;
        let key = K256SigningKey::from_slice(&bytes)
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
        Ok(SigningMaterial::Secp256k1(key))
    }

    pub fn from_ed25519_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; ED25519_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::UnsupportedKeyLength(bytes.len()))?;
        Ok(SigningMaterial::Ed25519(EdSigningKey::from(arr)))
    }

    /// Signs `message`, returning the wire-format base64url signature:
    /// secp256k1 signs to DER internally then re-encodes as fixed `R||S`;
    /// Ed25519 signs directly to its native 64-byte form.
    pub fn sign(&self, message: &[u8]) -> String {
        let sig_bytes: Vec<u8> = match self {
            SigningMaterial::Secp256k1(sk) => {
                let sig: K256Signature = sk.sign(message);
                sig.to_bytes().to_vec()
            }
            SigningMaterial::Ed25519(sk) => sk.sign(message).to_bytes().to_vec(),
        };
        encode_base64url(&sig_bytes)
    }

    pub fn verifying_key_material(&self) -> KeyMaterial {
        match self {
            SigningMaterial::Secp256k1(sk) => KeyMaterial::Secp256k1(*sk.verifying_key()),
            SigningMaterial::Ed25519(sk) => KeyMaterial::Ed25519(sk.verification_key()),
        }
    }
}

pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode_base64url(s: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| CryptoError::MalformedSignature(format!("invalid base64url: {e}")))
}

/// Converts a DER-encoded secp256k1 ECDSA signature to the fixed 64-byte
/// `R || S` wire format. Rejects an all-zero `R` or `S`, which `k256`
/// would otherwise treat as structurally valid DER but which is not a
/// usable signature.
pub fn der_to_rs(der: &[u8]) -> Result<[u8; RS_SIGNATURE_LEN], CryptoError> {
    let sig = K256Signature::from_der(der)
        .map_err(|e| CryptoError::InvalidDer(e.to_string()))?;
    let bytes = sig.to_bytes();
    let (r, s) = bytes.split_at(32);
    if r.iter().all(|b| *b == 0) || s.iter().all(|b| *b == 0) {
        return Err(CryptoError::MalformedSignature("zero R or S component".into()));
    }
    let mut out = [0u8; RS_SIGNATURE_LEN];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Converts a fixed 64-byte `R || S` signature to canonical DER, the
/// inverse of [`der_to_rs`].
pub fn rs_to_der(rs: &[u8; RS_SIGNATURE_LEN]) -> Result<Vec<u8>, CryptoError> {
    let sig = K256Signature::from_slice(rs)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    Ok(sig.to_der().as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secp256k1_round_trip() {
        let signing = SigningMaterial::from_secp256k1_hex(
            "f8c89b32a2fc1d1caf0c4d1aea8f8e6f8a9ebdb5d8bcda6a8a3c0b62470a0f55",
        )
        .unwrap();
        let key = signing.verifying_key_material();
        let sig = signing.sign(b"hello wba");
        key.verify(b"hello wba", &sig).unwrap();
        assert!(key.verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn ed25519_round_trip() {
        let signing = SigningMaterial::from_ed25519_bytes(&[7u8; 32]).unwrap();
        let key = signing.verifying_key_material();
        let sig = signing.sign(b"hello wba");
        key.verify(b"hello wba", &sig).unwrap();
        assert!(key.verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn der_rs_round_trip() {
        let signing = SigningMaterial::from_secp256k1_hex(
            "f8c89b32a2fc1d1caf0c4d1aea8f8e6f8a9ebdb5d8bcda6a8a3c0b62470a0f55",
        )
        .unwrap();
        let sig: K256Signature = match &signing {
            SigningMaterial::Secp256k1(sk) => k256::ecdsa::signature::Signer::sign(sk, b"payload"),
            _ => unreachable!(),
        };
        let rs: [u8; RS_SIGNATURE_LEN] = sig.to_bytes().as_slice().try_into().unwrap();
        let der = rs_to_der(&rs).unwrap();
        assert_eq!(der_to_rs(&der).unwrap(), rs);

        let der2 = rs_to_der(&der_to_rs(&der).unwrap()).unwrap();
        assert_eq!(
            K256Signature::from_der(&der).unwrap(),
            K256Signature::from_der(&der2).unwrap()
        );
    }

    #[test]
    fn rejects_unsupported_key_length() {
        assert!(KeyMaterial::from_bytes_for_test(&[0u8; 10]).is_err());
    }

    impl KeyMaterial {
        fn from_bytes_for_test(bytes: &[u8]) -> Result<Self, CryptoError> {
            Self::from_bytes(bytes)
        }
    }
}
