//! Panel registrations and their secret keys.

use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::users;
use crate::error::RelayError;

/// Random bytes behind each panel key (192 bits).
pub const PANEL_KEY_BYTES: usize = 24;

/// Key-generation attempts before giving up on collisions.
const MAX_KEY_ATTEMPTS: usize = 5;

/// A registered remote agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Panel {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub panel_key: String,
    pub last_ping: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fresh URL-safe panel key from the OS RNG.
pub fn generate_panel_key() -> String {
    let mut bytes = [0u8; PANEL_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Register a new panel for `user_id` under a freshly generated key.
pub async fn create_panel(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Panel, RelayError> {
    create_panel_with_keys(pool, user_id, name, now, generate_panel_key).await
}

async fn create_panel_with_keys(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    now: DateTime<Utc>,
    mut next_key: impl FnMut() -> String,
) -> Result<Panel, RelayError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RelayError::MissingField("name"));
    }
    if users::get_user(pool, user_id).await?.is_none() {
        return Err(RelayError::UnknownUser);
    }

    for attempt in 1..=MAX_KEY_ATTEMPTS {
        match insert_panel(pool, user_id, name, &next_key(), now).await {
            Ok(panel) => {
                info!(panel_id = panel.id, user_id, "Created panel");
                return Ok(panel);
            }
            Err(RelayError::DuplicateKey) => {
                warn!(user_id, attempt, "Panel key collision, regenerating");
            }
            Err(e) => return Err(e),
        }
    }
    Err(RelayError::DuplicateKey)
}

async fn insert_panel(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    panel_key: &str,
    now: DateTime<Utc>,
) -> Result<Panel, RelayError> {
    sqlx::query_as::<_, Panel>(
        r"
        INSERT INTO panels (user_id, name, panel_key, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, user_id, name, panel_key, last_ping, created_at
        ",
    )
    .bind(user_id)
    .bind(name)
    .bind(panel_key)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RelayError::DuplicateKey
        }
        e => RelayError::Database(e),
    })
}

/// All panels owned by `user_id`, oldest first.
pub async fn list_panels(pool: &SqlitePool, user_id: i64) -> Result<Vec<Panel>, RelayError> {
    let panels = sqlx::query_as::<_, Panel>(
        r"
        SELECT id, user_id, name, panel_key, last_ping, created_at
        FROM panels
        WHERE user_id = ? ORDER BY id
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(panels)
}

pub async fn get_panel(pool: &SqlitePool, panel_id: i64) -> Result<Option<Panel>, RelayError> {
    let panel = sqlx::query_as::<_, Panel>(
        r"
        SELECT id, user_id, name, panel_key, last_ping, created_at
        FROM panels
        WHERE id = ?
        ",
    )
    .bind(panel_id)
    .fetch_optional(pool)
    .await?;
    Ok(panel)
}

pub async fn find_panel_by_key(
    pool: &SqlitePool,
    panel_key: &str,
) -> Result<Option<Panel>, RelayError> {
    let panel = sqlx::query_as::<_, Panel>(
        r"
        SELECT id, user_id, name, panel_key, last_ping, created_at
        FROM panels
        WHERE panel_key = ?
        ",
    )
    .bind(panel_key)
    .fetch_optional(pool)
    .await?;
    Ok(panel)
}
