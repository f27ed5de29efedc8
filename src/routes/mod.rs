//! HTTP route handlers and router assembly.
//!
//! - [`health`] is public.
//! - [`relay`] is the agent protocol; each call authenticates with the panel key
//!   in its path.
//! - [`operator`] requires the operator key via
//!   [`crate::auth::require_operator_key`].

pub mod health;
pub mod operator;
pub mod relay;

use axum::{
    middleware,
    routing::{delete, get, post},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::{self, OperatorKey};
use crate::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/api/health", get(health::health));

    let relay_routes = Router::new()
        .route("/api/{panel_key}/connect", post(relay::connect))
        .route("/api/{panel_key}/command", post(relay::submit_command))
        .route("/api/{panel_key}/command/next", get(relay::next_command))
        .route("/api/{panel_key}/command/done", post(relay::command_done));

    let operator_routes = Router::new()
        .route("/operator/login", post(operator::login))
        .route("/operator/users/{user_id}/panels", get(operator::list_panels))
        .route("/operator/panels", post(operator::create_panel))
        .route("/operator/panels/{panel_id}", get(operator::get_panel))
        .route(
            "/operator/panels/{panel_id}/commands",
            get(operator::list_commands),
        )
        .route(
            "/operator/panels/{panel_id}/commands/done",
            delete(operator::purge_done),
        )
        .layer(middleware::from_fn(auth::require_operator_key));

    Router::new()
        .merge(public_routes)
        .merge(relay_routes)
        .merge(operator_routes)
        .layer(Extension(OperatorKey(state.config.auth.api_key.clone())))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
