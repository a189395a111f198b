//! Error types for the FedMCP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fedmcp_core::SigningError;

use crate::service::ServiceError;
use crate::storage::StorageError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Upstream error: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(e) => AppError::BadRequest(e.to_string()),
            ServiceError::NotFound(id) => AppError::NotFound(format!("Artifact not found: {}", id)),
            e @ (ServiceError::VersionConflict { .. } | ServiceError::ImmutableField { .. }) => {
                AppError::Conflict(e.to_string())
            }
            ServiceError::Verification(e) => AppError::BadRequest(e.category().to_string()),
            ServiceError::Signing(e) => match e {
                SigningError::Unavailable(_) | SigningError::KeyUnavailable(_) => {
                    AppError::ServiceUnavailable(e.to_string())
                }
                SigningError::Rejected(_) | SigningError::BadSignature(_) => {
                    AppError::BadGateway(e.to_string())
                }
                SigningError::Canonicalization(_) => AppError::Internal(e.to_string()),
            },
            ServiceError::Storage(e) => match e {
                StorageError::InvalidKey(_) => AppError::BadRequest(e.to_string()),
                StorageError::Io(_) | StorageError::ObjectStore(_) => {
                    AppError::ServiceUnavailable(e.to_string())
                }
                other => AppError::Internal(other.to_string()),
            },
            ServiceError::Audit(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Unauthorized(msg) => {
                let mut response = (StatusCode::UNAUTHORIZED, msg).into_response();
                response.headers_mut().insert(
                    axum::http::header::WWW_AUTHENTICATE,
                    axum::http::HeaderValue::from_static("Bearer"),
                );
                response
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg).into_response(),
            AppError::BadGateway(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Signing backend error").into_response()
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Backend unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Backend temporarily unavailable").into_response()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
