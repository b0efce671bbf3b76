//! API Error Handling
//!
//! Error responses of the telemetry server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use podcycle_core::dto::stats::ErrorBody;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// API key missing or wrong
    Forbidden(&'static str),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorBody::with_message("Forbidden", msg),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal Server Error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
