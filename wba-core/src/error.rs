//! Error taxonomy for the protocol layer: `Crypto`, `Protocol`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported key length: {0} bytes")]
    UnsupportedKeyLength(usize),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("invalid DER signature: {0}")]
    InvalidDer(String),

    #[error("signature verification failed")]
    VerificationFailed,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed authorization header: {0}")]
    MalformedHeader(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("timestamp out of window: {0}")]
    TimestampOutOfWindow(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
