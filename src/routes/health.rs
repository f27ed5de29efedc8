//! Unauthenticated health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::store;
use crate::AppState;

/// `GET /api/health` — health check.
///
/// Returns status, uptime, version, and whether the database answers. No
/// authentication required, suitable for load-balancer health checks.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let database = if store::ping(&state.pool).await {
        "ok"
    } else {
        "error"
    };

    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}
