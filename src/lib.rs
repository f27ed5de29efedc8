#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]

//! panelrelay library — the command queue, liveness tracking, and HTTP surface
//! behind the `panelrelay` binary.
//!
//! - `store` — users, panels, and per-panel command queues (SQLite via sqlx)
//! - `liveness` — heartbeats and the freshness check
//! - `routes` — relay (agent) and operator REST handlers, router assembly
//! - `auth` — operator key middleware
//! - `config` — configuration loading
//! - `clock` — injectable time source

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod liveness;
pub mod routes;
pub mod state;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::RelayError;
pub use state::AppState;
