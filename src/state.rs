//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;

/// Shared application state for the relay server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Process-wide connection pool; handlers check connections out per query.
    pub pool: SqlitePool,
    /// Time source for heartbeats and liveness checks.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool) -> Self {
        Self::with_clock(config, pool, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            pool,
            clock,
        }
    }

    /// Current time according to the configured clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn freshness_window(&self) -> Duration {
        self.config.liveness.freshness_window()
    }
}
