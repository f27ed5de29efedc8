//! Agent-facing relay endpoints, authenticated by the panel key in the path.
//!
//! ```text
//! POST /api/{panel_key}/connect       heartbeat
//! POST /api/{panel_key}/command       queue a command  {"command": "..."} or command=...
//! GET  /api/{panel_key}/command/next  oldest pending command, or {}
//! POST /api/{panel_key}/command/done  acknowledge      {"id": N}
//! ```
//!
//! Every call from the agent (connect, next, done) refreshes the panel's
//! heartbeat. Submitting a command is an operator action and does not.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::header,
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::RelayError;
use crate::liveness;
use crate::store::{commands, panels};
use crate::AppState;

/// Body of `POST /api/{panel_key}/command`.
#[derive(Deserialize)]
pub struct SubmitCommand {
    pub command: Option<String>,
}

/// Body of `POST /api/{panel_key}/command/done`.
#[derive(Deserialize)]
pub struct AckCommand {
    pub id: Option<i64>,
}

/// Command text from a JSON body, or from a urlencoded form as web clients send.
async fn submit_payload(request: Request) -> Option<String> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let body = if is_form {
        Form::<SubmitCommand>::from_request(request, &())
            .await
            .ok()
            .map(|Form(b)| b)
    } else {
        Json::<SubmitCommand>::from_request(request, &())
            .await
            .ok()
            .map(|Json(b)| b)
    };
    body.and_then(|b| b.command).filter(|c| !c.is_empty())
}

/// `POST /api/{panel_key}/connect` — heartbeat.
pub async fn connect(
    State(state): State<AppState>,
    Path(panel_key): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let panel = panels::find_panel_by_key(&state.pool, &panel_key)
        .await?
        .ok_or(RelayError::InvalidKey)?;

    let was_connected = liveness::is_connected(&panel, state.now(), state.freshness_window());
    liveness::touch(&state.pool, panel.id, state.now()).await?;
    if !was_connected {
        info!(panel_id = panel.id, name = %panel.name, "Panel connected");
    }
    Ok(Json(json!({"status": "connected"})))
}

/// `POST /api/{panel_key}/command` — append a command to the panel's queue.
pub async fn submit_command(
    State(state): State<AppState>,
    Path(panel_key): Path<String>,
    request: Request,
) -> Result<Json<Value>, RelayError> {
    let panel = panels::find_panel_by_key(&state.pool, &panel_key)
        .await?
        .ok_or(RelayError::InvalidKey)?;

    let payload = submit_payload(request)
        .await
        .ok_or(RelayError::MissingField("command"))?;

    let command = commands::enqueue(&state.pool, panel.id, &payload, state.now()).await?;
    info!(panel_id = panel.id, command_id = command.id, "Command queued");
    Ok(Json(json!({"status": "queued"})))
}

/// `GET /api/{panel_key}/command/next` — oldest unacknowledged command.
///
/// Returns `{}` when the queue is empty and also when the key is unknown, so an
/// agent with a revoked or mistyped key just sees an idle queue.
pub async fn next_command(
    State(state): State<AppState>,
    Path(panel_key): Path<String>,
) -> Result<Json<Value>, RelayError> {
    let Some(panel) = panels::find_panel_by_key(&state.pool, &panel_key).await? else {
        debug!("Poll with unknown panel key");
        return Ok(Json(json!({})));
    };
    liveness::touch(&state.pool, panel.id, state.now()).await?;

    match commands::peek_next_pending(&state.pool, panel.id).await? {
        Some(cmd) => Ok(Json(json!({"id": cmd.id, "command": cmd.command}))),
        None => Ok(Json(json!({}))),
    }
}

/// `POST /api/{panel_key}/command/done` — acknowledge an executed command.
pub async fn command_done(
    State(state): State<AppState>,
    Path(panel_key): Path<String>,
    body: Result<Json<AckCommand>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    let panel = panels::find_panel_by_key(&state.pool, &panel_key)
        .await?
        .ok_or(RelayError::InvalidPanel)?;

    let command_id = body
        .ok()
        .and_then(|Json(b)| b.id)
        .ok_or(RelayError::MissingField("id"))?;

    liveness::touch(&state.pool, panel.id, state.now()).await?;
    commands::mark_done(&state.pool, panel.id, command_id).await?;
    Ok(Json(json!({"ok": true})))
}
