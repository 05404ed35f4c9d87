//! Authentication module for managing the persisted user session.
//!
//! This module provides:
//! - `Session`: the access/refresh token pair plus the user's identity
//! - `SessionStore`: get/set/clear over a pluggable storage backend
//! - `SessionStorage`: the key/value seam, with file, keychain and
//!   in-memory implementations
//!
//! A session is either fully present or fully absent. There is no expiry
//! timer; the backend decides when a token is stale by answering 401.

pub mod session;
pub mod storage;

pub use session::{Session, SessionStore};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageError};
