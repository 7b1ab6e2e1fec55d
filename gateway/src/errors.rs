//! Gateway-wide error types and the HTTP mapping for façade errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use cfp_registry::FacadeError;

/// Startup and configuration failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

/// Façade error carried out of a handler; converts into the HTTP response
/// for the fixed taxonomy.  Ledger-internal detail never reaches the body.
#[derive(Debug)]
pub struct ApiError(pub FacadeError);

impl From<FacadeError> for ApiError {
    fn from(err: FacadeError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            FacadeError::InvalidIdentifier(detail) => {
                (StatusCode::BAD_REQUEST, format!("Invalid identifier: {detail}"))
            }
            FacadeError::ClosingTimeInPast => (
                StatusCode::BAD_REQUEST,
                "Closing time is not in the future".to_string(),
            ),
            FacadeError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            FacadeError::AlreadyRegistered => (
                StatusCode::FORBIDDEN,
                "Proposal already registered".to_string(),
            ),
            FacadeError::CallClosed => (StatusCode::FORBIDDEN, "Call is closed".to_string()),
            FacadeError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            FacadeError::AlreadyExists => {
                (StatusCode::CONFLICT, "Call already exists".to_string())
            }
            FacadeError::LedgerUnavailable(detail) => {
                tracing::warn!("ledger unavailable: {detail}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Ledger temporarily unavailable, retry later".to_string(),
                )
            }
            FacadeError::Internal => {
                tracing::error!("internal error serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
