//! Panel liveness: heartbeats and the freshness check.
//!
//! A panel is connected while its last heartbeat is younger than the freshness
//! window. Nothing sweeps stale panels; the check is evaluated on read.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::RelayError;
use crate::store::Panel;

/// Default freshness window.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(10);

/// Record a heartbeat for `panel_id` at `now`.
pub async fn touch(pool: &SqlitePool, panel_id: i64, now: DateTime<Utc>) -> Result<(), RelayError> {
    let result = sqlx::query("UPDATE panels SET last_ping = ? WHERE id = ?")
        .bind(now)
        .bind(panel_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RelayError::UnknownPanel);
    }
    Ok(())
}

/// Whether `panel` has sent a heartbeat within `window` of `now`.
///
/// A heartbeat stamped after `now` (clock skew between requests) counts as
/// fresh.
pub fn is_connected(panel: &Panel, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(last_ping) = panel.last_ping else {
        return false;
    };
    match (now - last_ping).to_std() {
        Ok(elapsed) => elapsed < window,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::store::panels::{create_panel, get_panel};
    use crate::store::{test_pool, users::find_or_create_user};

    #[tokio::test]
    async fn test_connection_follows_heartbeats() {
        let pool = test_pool().await;
        let clock = ManualClock::new(Utc::now());
        let user = find_or_create_user(&pool, "a@x.com", "pw").await.unwrap();
        let panel = create_panel(&pool, user.id, "bot1", clock.now())
            .await
            .unwrap();

        assert!(!is_connected(&panel, clock.now(), DEFAULT_FRESHNESS_WINDOW));

        touch(&pool, panel.id, clock.now()).await.unwrap();
        let panel = get_panel(&pool, panel.id).await.unwrap().unwrap();
        assert!(is_connected(&panel, clock.now(), DEFAULT_FRESHNESS_WINDOW));

        clock.advance(chrono::Duration::seconds(9));
        assert!(is_connected(&panel, clock.now(), DEFAULT_FRESHNESS_WINDOW));

        // The window is exclusive.
        clock.advance(chrono::Duration::seconds(1));
        assert!(!is_connected(&panel, clock.now(), DEFAULT_FRESHNESS_WINDOW));

        touch(&pool, panel.id, clock.now()).await.unwrap();
        let panel = get_panel(&pool, panel.id).await.unwrap().unwrap();
        assert!(is_connected(&panel, clock.now(), DEFAULT_FRESHNESS_WINDOW));
    }

    #[tokio::test]
    async fn test_touch_unknown_panel() {
        let pool = test_pool().await;
        let err = touch(&pool, 7, Utc::now()).await.unwrap_err();
        assert!(matches!(err, RelayError::UnknownPanel));
    }

    #[test]
    fn test_future_heartbeat_counts_as_fresh() {
        let now = Utc::now();
        let panel = Panel {
            id: 1,
            user_id: 1,
            name: "bot1".into(),
            panel_key: "k".into(),
            last_ping: Some(now + chrono::Duration::seconds(3)),
            created_at: now,
        };
        assert!(is_connected(&panel, now, DEFAULT_FRESHNESS_WINDOW));
    }
}
