//! Operator endpoints: account entry, panel management, command history.
//!
//! All routes here sit behind [`crate::auth::require_operator_key`].

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::RelayError;
use crate::liveness;
use crate::store::{commands, panels, users, Panel, User};
use crate::AppState;

/// Body of `POST /operator/login`.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `POST /operator/panels`.
#[derive(Deserialize)]
pub struct CreatePanelRequest {
    pub user_id: Option<i64>,
    pub name: Option<String>,
}

/// Query parameters for `GET /operator/panels/{panel_id}/commands`.
#[derive(Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of commands to return. Defaults to 50, max 200.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// A panel as the operator sees it: the stored row plus its live status.
#[derive(Serialize)]
pub struct PanelView {
    #[serde(flatten)]
    pub panel: Panel,
    pub connected: bool,
    /// Unacknowledged commands; only filled in on the single-panel view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<i64>,
}

impl PanelView {
    fn new(state: &AppState, panel: Panel) -> Self {
        let connected = liveness::is_connected(&panel, state.now(), state.freshness_window());
        Self {
            panel,
            connected,
            pending: None,
        }
    }
}

fn path_panel_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, RelayError> {
    path.map(|Path(id)| id)
        .map_err(|_| RelayError::MissingField("panel_id"))
}

/// `POST /operator/login` — find or create the account for an email.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<User>, RelayError> {
    let Json(req) = body.map_err(|_| RelayError::MissingField("email"))?;
    let email = req.email.ok_or(RelayError::MissingField("email"))?;
    let password = req.password.ok_or(RelayError::MissingField("password"))?;

    let user = users::find_or_create_user(&state.pool, &email, &password).await?;
    Ok(Json(user))
}

/// `GET /operator/users/{user_id}/panels` — the user's panels, oldest first.
pub async fn list_panels(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, RelayError> {
    let Path(user_id) = path.map_err(|_| RelayError::MissingField("user_id"))?;
    users::get_user(&state.pool, user_id)
        .await?
        .ok_or(RelayError::UnknownUser)?;

    let panels = panels::list_panels(&state.pool, user_id).await?;
    let panels: Vec<PanelView> = panels
        .into_iter()
        .map(|p| PanelView::new(&state, p))
        .collect();
    Ok(Json(json!({"panels": panels})))
}

/// `POST /operator/panels` — register a panel and issue its key.
pub async fn create_panel(
    State(state): State<AppState>,
    body: Result<Json<CreatePanelRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PanelView>), RelayError> {
    let Json(req) = body.map_err(|_| RelayError::MissingField("user_id"))?;
    let user_id = req.user_id.ok_or(RelayError::MissingField("user_id"))?;
    let name = req.name.ok_or(RelayError::MissingField("name"))?;

    let panel = panels::create_panel(&state.pool, user_id, &name, state.now()).await?;
    Ok((StatusCode::CREATED, Json(PanelView::new(&state, panel))))
}

/// `GET /operator/panels/{panel_id}` — panel detail with connection status.
pub async fn get_panel(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PanelView>, RelayError> {
    let panel = panels::get_panel(&state.pool, path_panel_id(path)?)
        .await?
        .ok_or(RelayError::UnknownPanel)?;
    let pending = commands::count_pending(&state.pool, panel.id).await?;

    let mut view = PanelView::new(&state, panel);
    view.pending = Some(pending);
    Ok(Json(view))
}

/// `GET /operator/panels/{panel_id}/commands` — recent commands, newest first.
pub async fn list_commands(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Value>, RelayError> {
    let panel_id = path_panel_id(path)?;
    let Query(query) = query.map_err(|_| RelayError::MissingField("limit"))?;
    panels::get_panel(&state.pool, panel_id)
        .await?
        .ok_or(RelayError::UnknownPanel)?;

    let limit = query.limit.min(200);
    let history = commands::list_commands(&state.pool, panel_id, limit).await?;
    Ok(Json(json!({"commands": history})))
}

/// `DELETE /operator/panels/{panel_id}/commands/done` — drop acknowledged commands.
pub async fn purge_done(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, RelayError> {
    let panel_id = path_panel_id(path)?;
    panels::get_panel(&state.pool, panel_id)
        .await?
        .ok_or(RelayError::UnknownPanel)?;

    let purged = commands::purge_done(&state.pool, panel_id).await?;
    info!(panel_id, purged, "Purged completed commands");
    Ok(Json(json!({"purged": purged})))
}
