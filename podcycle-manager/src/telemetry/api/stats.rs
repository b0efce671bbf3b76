//! Stats API Handler

use axum::{Json, extract::State};
use podcycle_core::dto::stats::StatsResponse;

use super::AppState;

/// GET /stats
/// Current telemetry counters
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    tracing::debug!("Serving stats");

    Json(StatsResponse {
        stats: state.stats.get_all(),
    })
}
