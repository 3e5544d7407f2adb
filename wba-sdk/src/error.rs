//! SDK-level error taxonomy: `Resolution`, `Auth`, `Resource`, `Timeout`,
//! layered over the protocol-level `Crypto`/`Protocol` errors.

use thiserror::Error;
use wba_core::{CryptoError, ProtocolError};

#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to resolve DID {did}: {reason}")]
    Resolution { did: String, reason: String },

    #[error("transport error calling {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("token expired")]
    TokenExpired,

    #[error("token revoked")]
    TokenRevoked,

    #[error("unknown token")]
    UnknownToken,

    #[error("session expired")]
    SessionExpired,

    #[error("unknown session")]
    UnknownSession,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no handler registered for scheme {0:?}")]
    NoHandler(wba_core::header::AuthScheme),
}

impl From<CryptoError> for SdkError {
    /// A bare signature-verification failure is still a protocol-layer
    /// failure from the SDK's point of view; route it through
    /// `ProtocolError::Crypto` so `reason_code` has one place that maps
    /// crypto failures to `SignatureInvalid`.
    fn from(e: CryptoError) -> Self {
        SdkError::Protocol(ProtocolError::from(e))
    }
}

impl SdkError {
    /// The machine-readable reason code for the `{"code": ..., "message": ...}`
    /// error body shape.
    pub fn reason_code(&self) -> &'static str {
        match self {
            SdkError::Protocol(wba_core::ProtocolError::MalformedHeader(_)) => "MalformedHeader",
            SdkError::Protocol(wba_core::ProtocolError::MissingField(_)) => "MalformedHeader",
            SdkError::Protocol(wba_core::ProtocolError::TimestampOutOfWindow(_)) => "TimestampOutOfWindow",
            SdkError::Protocol(wba_core::ProtocolError::Canonicalization(_)) => "SignatureInvalid",
            SdkError::Protocol(wba_core::ProtocolError::Crypto(_)) => "SignatureInvalid",
            SdkError::Resolution { .. } => "DidNotFound",
            SdkError::Transport { .. } => "Timeout",
            SdkError::Auth(_) => "Unauthorized",
            SdkError::TokenExpired => "TokenExpired",
            SdkError::TokenRevoked => "TokenExpired",
            SdkError::UnknownToken => "Unauthorized",
            SdkError::SessionExpired => "SessionExpired",
            SdkError::UnknownSession => "SessionExpired",
            SdkError::NotFound(_) => "NotFound",
            SdkError::Timeout(_) => "Timeout",
            SdkError::NoHandler(_) => "UnsupportedAuthMethod",
        }
    }
}
