//! Per-panel command queue.
//!
//! Commands are delivered oldest first (ascending id) and stay pending until the
//! agent acknowledges them, so a command fetched by an agent that dies before
//! acknowledging is handed out again on the next poll.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::RelayError;

/// A queued command. `done` only ever goes from false to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Command {
    pub id: i64,
    pub panel_id: i64,
    pub command: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

/// Append `payload` to the panel's queue.
pub async fn enqueue(
    pool: &SqlitePool,
    panel_id: i64,
    payload: &str,
    now: DateTime<Utc>,
) -> Result<Command, RelayError> {
    if payload.is_empty() {
        return Err(RelayError::MissingField("command"));
    }

    // Insert only if the panel exists, in one statement.
    let command = sqlx::query_as::<_, Command>(
        r"
        INSERT INTO commands (panel_id, command, done, created_at)
        SELECT id, ?, 0, ? FROM panels WHERE id = ?
        RETURNING id, panel_id, command, done, created_at
        ",
    )
    .bind(payload)
    .bind(now)
    .bind(panel_id)
    .fetch_optional(pool)
    .await?
    .ok_or(RelayError::UnknownPanel)?;

    debug!(panel_id, command_id = command.id, "Queued command");
    Ok(command)
}

/// Oldest command for the panel that has not been acknowledged yet.
pub async fn peek_next_pending(
    pool: &SqlitePool,
    panel_id: i64,
) -> Result<Option<Command>, RelayError> {
    let command = sqlx::query_as::<_, Command>(
        r"
        SELECT id, panel_id, command, done, created_at
        FROM commands
        WHERE panel_id = ? AND done = 0
        ORDER BY id
        LIMIT 1
        ",
    )
    .bind(panel_id)
    .fetch_optional(pool)
    .await?;
    Ok(command)
}

/// Flag `command_id` as executed.
///
/// The command must belong to `panel_id`. Acknowledging an already-done command
/// succeeds without changing anything.
pub async fn mark_done(pool: &SqlitePool, panel_id: i64, command_id: i64) -> Result<(), RelayError> {
    let result = sqlx::query("UPDATE commands SET done = 1 WHERE id = ? AND panel_id = ?")
        .bind(command_id)
        .bind(panel_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RelayError::CommandNotFound);
    }
    debug!(panel_id, command_id, "Command acknowledged");
    Ok(())
}

/// Most recent commands for the panel, newest first.
pub async fn list_commands(
    pool: &SqlitePool,
    panel_id: i64,
    limit: u32,
) -> Result<Vec<Command>, RelayError> {
    let commands = sqlx::query_as::<_, Command>(
        r"
        SELECT id, panel_id, command, done, created_at
        FROM commands
        WHERE panel_id = ?
        ORDER BY id DESC
        LIMIT ?
        ",
    )
    .bind(panel_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(commands)
}

pub async fn count_pending(pool: &SqlitePool, panel_id: i64) -> Result<i64, RelayError> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM commands WHERE panel_id = ? AND done = 0")
            .bind(panel_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Delete the panel's acknowledged commands. Pending ones are kept.
pub async fn purge_done(pool: &SqlitePool, panel_id: i64) -> Result<u64, RelayError> {
    let result = sqlx::query("DELETE FROM commands WHERE panel_id = ? AND done = 1")
        .bind(panel_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::panels::{create_panel, Panel};
    use crate::store::{test_pool, users::find_or_create_user};

    async fn setup() -> (SqlitePool, Panel, Panel) {
        let pool = test_pool().await;
        let user = find_or_create_user(&pool, "a@x.com", "pw").await.unwrap();
        let bot1 = create_panel(&pool, user.id, "bot1", Utc::now())
            .await
            .unwrap();
        let bot2 = create_panel(&pool, user.id, "bot2", Utc::now())
            .await
            .unwrap();
        (pool, bot1, bot2)
    }

    #[tokio::test]
    async fn test_peek_returns_oldest_pending() {
        let (pool, panel, _) = setup().await;
        let now = Utc::now();
        let first = enqueue(&pool, panel.id, "one", now).await.unwrap();
        for payload in ["two", "three", "four"] {
            enqueue(&pool, panel.id, payload, now).await.unwrap();
        }

        let next = peek_next_pending(&pool, panel.id).await.unwrap().unwrap();
        assert_eq!(next, first);
        assert!(!next.done);

        // Peeking does not consume.
        let again = peek_next_pending(&pool, panel.id).await.unwrap().unwrap();
        assert_eq!(again.id, first.id);

        mark_done(&pool, panel.id, first.id).await.unwrap();
        let next = peek_next_pending(&pool, panel.id).await.unwrap().unwrap();
        assert_eq!(next.command, "two");
    }

    #[tokio::test]
    async fn test_empty_queue_yields_none() {
        let (pool, panel, _) = setup().await;
        assert!(peek_next_pending(&pool, panel.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_done_is_idempotent() {
        let (pool, panel, _) = setup().await;
        let cmd = enqueue(&pool, panel.id, "say hello", Utc::now())
            .await
            .unwrap();
        mark_done(&pool, panel.id, cmd.id).await.unwrap();
        mark_done(&pool, panel.id, cmd.id).await.unwrap();

        let history = list_commands(&pool, panel.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].done);
        assert!(peek_next_pending(&pool, panel.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_mark_done_both_succeed() {
        let (pool, panel, _) = setup().await;
        let cmd = enqueue(&pool, panel.id, "say hello", Utc::now())
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            mark_done(&pool, panel.id, cmd.id),
            mark_done(&pool, panel.id, cmd.id)
        );
        assert!(a.is_ok());
        assert!(b.is_ok());

        let history = list_commands(&pool, panel.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].done);
        assert_eq!(count_pending(&pool, panel.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_done_rejects_foreign_panel() {
        let (pool, bot1, bot2) = setup().await;
        let cmd = enqueue(&pool, bot1.id, "say hello", Utc::now())
            .await
            .unwrap();

        let err = mark_done(&pool, bot2.id, cmd.id).await.unwrap_err();
        assert!(matches!(err, RelayError::CommandNotFound));
        // Still pending on its real owner.
        assert_eq!(
            peek_next_pending(&pool, bot1.id).await.unwrap().map(|c| c.id),
            Some(cmd.id)
        );
    }

    #[tokio::test]
    async fn test_mark_done_unknown_command() {
        let (pool, panel, _) = setup().await;
        let err = mark_done(&pool, panel.id, 999).await.unwrap_err();
        assert!(matches!(err, RelayError::CommandNotFound));
    }

    #[tokio::test]
    async fn test_enqueue_unknown_panel() {
        let (pool, _, _) = setup().await;
        let err = enqueue(&pool, 999, "say hello", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownPanel));
    }

    #[tokio::test]
    async fn test_enqueue_empty_payload() {
        let (pool, panel, _) = setup().await;
        let err = enqueue(&pool, panel.id, "", Utc::now()).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingField("command")));
    }

    #[tokio::test]
    async fn test_queues_are_per_panel() {
        let (pool, bot1, bot2) = setup().await;
        enqueue(&pool, bot1.id, "for bot1", Utc::now()).await.unwrap();
        assert!(peek_next_pending(&pool, bot2.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_keeps_pending() {
        let (pool, panel, _) = setup().await;
        let now = Utc::now();
        let a = enqueue(&pool, panel.id, "a", now).await.unwrap();
        let b = enqueue(&pool, panel.id, "b", now).await.unwrap();
        enqueue(&pool, panel.id, "c", now).await.unwrap();
        mark_done(&pool, panel.id, a.id).await.unwrap();
        mark_done(&pool, panel.id, b.id).await.unwrap();

        assert_eq!(count_pending(&pool, panel.id).await.unwrap(), 1);
        assert_eq!(purge_done(&pool, panel.id).await.unwrap(), 2);

        let remaining = list_commands(&pool, panel.id, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].command, "c");
        assert_eq!(purge_done(&pool, panel.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_limited() {
        let (pool, panel, _) = setup().await;
        for payload in ["a", "b", "c"] {
            enqueue(&pool, panel.id, payload, Utc::now()).await.unwrap();
        }
        let history = list_commands(&pool, panel.id, 2).await.unwrap();
        let payloads: Vec<&str> = history.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(payloads, ["c", "b"]);
    }
}
