//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `PANELRELAY_API_KEY`, `PANELRELAY_LISTEN`,
//!    `PANELRELAY_DATABASE_URL`
//! 2. **Config file** — path via `--config <path>`, or `panelrelay.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:5000"
//!
//! [database]
//! url = "sqlite://panelrelay.db?mode=rwc"
//! max_connections = 8
//! acquire_timeout_secs = 10
//!
//! [auth]
//! api_key = "your-operator-key"
//!
//! [liveness]
//! freshness_window_secs = 10
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:5000`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Persistent store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL. Override with `PANELRELAY_DATABASE_URL`.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Upper bound on pooled connections (default 8).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds a request waits for a pooled connection before failing (default 10).
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Operator authentication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Pre-shared Bearer token guarding the operator routes. Override with
    /// `PANELRELAY_API_KEY`. Defaults to `"change-me"` which triggers a startup
    /// warning.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

/// Panel liveness settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LivenessConfig {
    /// A panel counts as connected while its last heartbeat is younger than
    /// this many seconds (default 10).
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}
fn default_database_url() -> String {
    "sqlite://panelrelay.db?mode=rwc".to_string()
}
fn default_max_connections() -> u32 {
    8
}
fn default_acquire_timeout_secs() -> u64 {
    10
}
fn default_api_key() -> String {
    "change-me".to_string()
}
fn default_freshness_window_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LivenessConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise looks
    /// for `panelrelay.toml` in the current directory, falling back to compiled
    /// defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            Self::parse(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("panelrelay.toml").exists() {
            let content =
                std::fs::read_to_string("panelrelay.toml").expect("Failed to read panelrelay.toml");
            Self::parse(&content).expect("Failed to parse panelrelay.toml")
        } else {
            Config::default()
        };

        // Env var overrides
        if let Ok(key) = std::env::var("PANELRELAY_API_KEY") {
            config.auth.api_key = key;
        }
        if let Ok(listen) = std::env::var("PANELRELAY_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(url) = std::env::var("PANELRELAY_DATABASE_URL") {
            config.database.url = url;
        }

        config
    }

    /// Parse a TOML document; missing sections fall back to defaults.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
