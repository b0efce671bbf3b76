//! API Module
//!
//! HTTP surface of the telemetry server.
//! Each submodule handles one endpoint or one cross-cutting layer.

pub mod auth;
pub mod error;
pub mod logs;
pub mod stats;

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::Span;

use crate::telemetry::stats::Stats;
use error::ApiError;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<Stats>,

    /// Key every request must carry, `None` for open access
    pub api_key: Option<Arc<str>>,
}

/// Create the telemetry router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/stats", json_errors(get(stats::get_stats)))
        .route("/logs", text_errors(post(logs::receive_logs)))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
}

/// Route whose handler panics are answered with the JSON error body
fn json_errors(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.layer(CatchPanicLayer::custom(json_panic))
}

/// Route whose handler panics are answered with a plain-text body
fn text_errors(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.layer(CatchPanicLayer::custom(text_panic))
}

fn json_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = crate::panic::describe(panic.as_ref());
    ApiError::InternalError(format!("handler panicked: {}", detail)).into_response()
}

fn text_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(
        "Internal error: handler panicked: {}",
        crate::panic::describe(panic.as_ref())
    );
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Request span carrying the path only; query strings hold the API key
fn request_span(request: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}
