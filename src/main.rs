#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # panelrelay
//!
//! Remote command relay for polling agents.
//!
//! An operator registers panels (remote agents) and queues commands for them;
//! each agent polls with its panel key, runs the oldest pending command, and
//! acknowledges it. Commands stay pending until acknowledged, so an agent that
//! crashes mid-command gets it again on the next poll.
//!
//! ## Subcommands
//!
//! - `panelrelay serve` (default) — run the HTTP server
//! - `panelrelay migrate` — apply database migrations and exit
//!
//! ## API surface
//!
//! | Method | Path                                       | Auth         | Description                  |
//! |--------|--------------------------------------------|--------------|------------------------------|
//! | GET    | `/api/health`                              | No           | Health check                 |
//! | POST   | `/api/{panel_key}/connect`                 | panel key    | Heartbeat                    |
//! | POST   | `/api/{panel_key}/command`                 | panel key    | Queue a command              |
//! | GET    | `/api/{panel_key}/command/next`            | panel key    | Oldest pending command       |
//! | POST   | `/api/{panel_key}/command/done`            | panel key    | Acknowledge a command        |
//! | POST   | `/operator/login`                          | operator key | Find or create account       |
//! | GET    | `/operator/users/{user_id}/panels`         | operator key | List a user's panels         |
//! | POST   | `/operator/panels`                         | operator key | Create a panel               |
//! | GET    | `/operator/panels/{panel_id}`              | operator key | Panel detail + connected     |
//! | GET    | `/operator/panels/{panel_id}/commands`     | operator key | Command history              |
//! | DELETE | `/operator/panels/{panel_id}/commands/done`| operator key | Purge acknowledged commands  |
//!
//! ## Architecture
//!
//! ```text
//! main.rs          — entry point, clap subcommands, graceful shutdown
//! config.rs        — TOML + env-var configuration
//! auth.rs          — operator Bearer key middleware, constant-time comparison
//! clock.rs         — injectable time source
//! error.rs         — RelayError and its HTTP mapping
//! liveness.rs      — heartbeat writes, freshness predicate
//! state.rs         — AppState (config, pool, clock)
//! store/
//!   users.rs       — accounts, Argon2id credentials
//!   panels.rs      — panel registration, key generation
//!   commands.rs    — per-panel command queue
//! routes/
//!   health.rs      — GET /api/health
//!   relay.rs       — agent protocol
//!   operator.rs    — operator endpoints
//! ```

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use panelrelay::{routes, store, AppState, Config};

/// Remote command relay for polling agents.
#[derive(Parser)]
#[command(name = "panelrelay", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
    /// Apply database migrations and exit.
    Migrate {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Migrate { config }) => run_migrate(config.as_deref()).await,
        Some(Commands::Serve { config }) => run_server(config.as_deref()).await,
        None => run_server(None).await,
    }
}

fn init_tracing(config: &Config) {
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();
}

async fn run_migrate(config_path: Option<&str>) {
    let config = Config::load(config_path);
    init_tracing(&config);

    // `connect` applies pending migrations before returning.
    store::connect(&config.database)
        .await
        .unwrap_or_else(|e| panic!("Failed to migrate {}: {e}", config.database.url));
    info!("Migrations complete");
}

async fn run_server(config_path: Option<&str>) {
    let config = Config::load(config_path);
    init_tracing(&config);

    info!("panelrelay v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);
    info!(
        "Freshness window: {}s",
        config.liveness.freshness_window_secs
    );

    if config.auth.api_key == "change-me" {
        warn!("Using default operator key — set PANELRELAY_API_KEY or update config");
    }

    let pool = store::connect(&config.database)
        .await
        .unwrap_or_else(|e| panic!("Failed to open database {}: {e}", config.database.url));

    let state = AppState::new(config, pool);
    let app = routes::router(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    info!("Server ready");

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    info!("Shutting down...");
    state.pool.close().await;
    info!("Goodbye");
}
