//! API key gate
//!
//! When the server is configured with a key, every request must carry it as
//! the `api_key` query parameter.

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ApiKeyQuery {
    api_key: Option<String>,
}

/// Rejects requests whose `api_key` does not match the configured key
pub async fn require_api_key(
    State(state): State<AppState>,
    query: Result<Query<ApiKeyQuery>, axum::extract::rejection::QueryRejection>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = query.ok().and_then(|Query(q)| q.api_key);

    match provided {
        None => {
            tracing::warn!("Rejected {} request without API key", request.uri().path());
            ApiError::Forbidden("API key required").into_response()
        }
        Some(key) if key != expected => {
            tracing::warn!("Rejected {} request with invalid API key", request.uri().path());
            ApiError::Forbidden("Invalid API key").into_response()
        }
        Some(_) => next.run(request).await,
    }
}
