//! Core library for splitledger.
//!
//! Everything the command-line front end needs to talk to the expense
//! backend lives here:
//!
//! - `auth`: the persisted `Session` and the storage backends behind it
//! - `api`: the authenticated `ApiClient` with its single-flight token refresh
//! - `models`: expenses, groups and users as the backend returns them
//! - `config`: the on-disk application configuration
//! - `utils`: display formatting helpers

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, AuthEvent, RefreshPhase};
pub use auth::{Session, SessionStore};
pub use config::Config;
