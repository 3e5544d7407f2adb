//! The single `Result` → HTTP boundary: every error enum in the
//! workspace funnels here to become a status code plus a short
//! machine-readable reason-code body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use wba_sdk::error::SdkError;

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("cannot infer target DID from request")]
    CannotInferTarget,

    #[error(transparent)]
    Auth(#[from] SdkError),

    #[error("agent not registered: {0}")]
    AgentNotFound(String),

    #[error("DID already registered: {0}")]
    AlreadyRegistered(String),

    #[error("hosted DID rejected")]
    HostedDidRejected,

    #[error("handler not implemented for this request type")]
    NotImplemented,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl RoutingError {
    fn reason_code(&self) -> &'static str {
        match self {
            RoutingError::CannotInferTarget => "CannotInferTarget",
            RoutingError::Auth(e) => e.reason_code(),
            RoutingError::AgentNotFound(_) => "AgentNotFound",
            RoutingError::AlreadyRegistered(_) => "AlreadyRegistered",
            RoutingError::HostedDidRejected => "HostedDIDRejected",
            RoutingError::NotImplemented => "NotImplemented",
            RoutingError::NotFound(_) => "NotFound",
            RoutingError::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            RoutingError::CannotInferTarget => StatusCode::BAD_REQUEST,
            RoutingError::Auth(SdkError::Protocol(wba_core::ProtocolError::MalformedHeader(_)))
            | RoutingError::Auth(SdkError::Protocol(wba_core::ProtocolError::MissingField(_))) => StatusCode::BAD_REQUEST,
            RoutingError::Auth(_) => StatusCode::UNAUTHORIZED,
            RoutingError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            RoutingError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            RoutingError::HostedDidRejected => StatusCode::FORBIDDEN,
            RoutingError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            RoutingError::NotFound(_) => StatusCode::NOT_FOUND,
            RoutingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.reason_code(),
            message: self.to_string(),
        };
        log::warn!(status = status.as_u16(), code = body.code; "request rejected");
        (status, Json(body)).into_response()
    }
}
