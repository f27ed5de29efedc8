//! Pre-shared operator key authentication.
//!
//! Operator endpoints (login, panel management, command history) require an
//! `Authorization: Bearer <key>` header. The agent-facing relay endpoints are
//! authenticated by the panel key in their path instead.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Gate for the operator routes.
///
/// The key it checks against comes from the [`OperatorKey`] extension set on
/// the router. No `Bearer` header gives 401, a wrong key gives 403, and a router
/// built without the extension answers 500 for every operator call.
pub async fn require_operator_key(request: Request, next: Next) -> Response {
    let Some(expected) = request.extensions().get::<OperatorKey>().cloned() else {
        return reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server configuration error",
        );
    };

    let verdict = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|key| constant_time_eq(expected.0.as_bytes(), key.as_bytes()));

    match verdict {
        None => reject(
            StatusCode::UNAUTHORIZED,
            "missing or invalid authorization header",
        ),
        Some(false) => reject(StatusCode::FORBIDDEN, "invalid operator key"),
        Some(true) => next.run(request).await,
    }
}

/// Compares two byte strings in time that depends only on `expected`.
///
/// A length mismatch is folded into the result instead of returning early.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for (i, e) in expected.iter().enumerate() {
        let p = provided.get(i).copied().unwrap_or(0xff);
        diff |= e ^ p;
    }
    diff == 0
}

/// The configured operator key, carried as a request extension.
#[derive(Clone)]
pub struct OperatorKey(pub String);
