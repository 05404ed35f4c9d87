//! REST API client module for the expense backend.
//!
//! This module provides the `ApiClient` for logging in, managing expenses
//! and groups, and keeping the stored session alive.
//!
//! Every authenticated request carries the stored access token as a bearer
//! token. A 401 triggers one shared token renewal (see `refresh`) followed by
//! a single retry; if renewal fails the session is cleared and callers get
//! `ApiError::SessionExpired`.

pub mod client;
mod endpoints;
pub mod error;
pub mod events;
mod refresh;

pub use client::{ApiClient, ApiClientBuilder, DEFAULT_BASE_URL};
pub use error::{ApiError, RefreshError};
pub use events::{AuthEvent, LogoutReason};
pub use refresh::RefreshPhase;
