//! Service error types with HTTP status code mapping.
//!
//! [`ServiceError`] is the central error type for request handling. Validation
//! failures carry a specific user-safe message; authorization and internal
//! failures map to deliberately generic bodies so a response never reveals
//! which check failed or any persistence/provider detail.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Flat JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request-level error taxonomy.
///
/// | Variant      | HTTP status | Body                                   |
/// |--------------|-------------|----------------------------------------|
/// | Validation   | 400         | the specific message                   |
/// | Unauthorized | 401         | generic "Invalid or expired token"     |
/// | Upstream     | 500         | generic internal-error message         |
/// | Storage      | 500         | generic internal-error message         |
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed, missing, or out-of-range input.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Token missing a signature, expired, tampered with, or bound to a
    /// different context. The response body never says which.
    #[error("token verification failed")]
    Unauthorized,

    /// Content provider or mail transport failure.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Persistence layer failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ServiceError {
    /// User-safe message for the response body.
    ///
    /// Internal detail stays in the `Display` impl and the server-side logs.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Unauthorized => "Invalid or expired token".to_string(),
            Self::Upstream(_) | Self::Storage(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request_failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request_rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}

impl From<crate::store::StoreError> for ServiceError {
    fn from(e: crate::store::StoreError) -> Self {
        match e {
            crate::store::StoreError::DuplicateEmail => {
                Self::Validation("This email is already subscribed".to_string())
            }
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<crate::content::ContentError> for ServiceError {
    fn from(e: crate::content::ContentError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<crate::mail::MailError> for ServiceError {
    fn from(e: crate::mail::MailError) -> Self {
        Self::Upstream(e.to_string())
    }
}
