//! Persistent store for users, panels, and their command queues.
//!
//! # Tables
//!
//! - `users` - operator accounts (email + Argon2id hash)
//! - `panels` - registered agents, each with a unique secret `panel_key`
//! - `commands` - per-panel queue; `done` flips false → true exactly once
//!
//! Every operation is a single statement against one row (or one panel's rows),
//! run on a connection checked out of the process-wide [`SqlitePool`] and
//! returned to it when the statement completes.

pub mod commands;
pub mod panels;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::RelayError;

pub use commands::Command;
pub use panels::Panel;
pub use users::User;

/// Open the connection pool and bring the schema up to date.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, RelayError> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    info!(url = %config.url, "Database ready");
    Ok(pool)
}

/// Apply the embedded migrations in `migrations/`.
pub async fn migrate(pool: &SqlitePool) -> Result<(), RelayError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Cheap round-trip used by the health endpoint.
pub async fn ping(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Single-connection in-memory pool with the schema applied.
///
/// The connection is never recycled, otherwise the in-memory database would be
/// dropped with it.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}
