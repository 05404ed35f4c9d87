use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::{MemoryStorage, SessionStorage, StorageError};

/// Storage keys. These names are shared with the web client.
pub const ACCESS_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_ID_KEY: &str = "userId";
pub const USER_EMAIL_KEY: &str = "userEmail";

const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY, USER_EMAIL_KEY];

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub user_email: String,
}

// Tokens stay out of logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("user_email", &self.user_email)
            .finish()
    }
}

impl Session {
    /// A session is only usable when every field is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty()
            && !self.refresh_token.is_empty()
            && !self.user_id.is_empty()
            && !self.user_email.is_empty()
    }
}

/// Handle to the persisted session. Clone is cheap and every clone sees the
/// same storage.
///
/// Reads and writes of the four keys go through one lock shared by all
/// clones, so a `clear` never interleaves with `set` or `update_tokens`.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    lock: Arc<Mutex<()>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Load the session. Partial leftovers count as no session and are wiped.
    pub fn get(&self) -> Result<Option<Session>, StorageError> {
        let _guard = self.guard();
        self.load()
    }

    fn load(&self) -> Result<Option<Session>, StorageError> {
        let read = |key: &str| -> Result<Option<String>, StorageError> {
            Ok(self.storage.get_item(key)?.filter(|v| !v.is_empty()))
        };
        let values = [
            read(ACCESS_TOKEN_KEY)?,
            read(REFRESH_TOKEN_KEY)?,
            read(USER_ID_KEY)?,
            read(USER_EMAIL_KEY)?,
        ];

        match values {
            [None, None, None, None] => Ok(None),
            [Some(access_token), Some(refresh_token), Some(user_id), Some(user_email)] => {
                Ok(Some(Session {
                    access_token,
                    refresh_token,
                    user_id,
                    user_email,
                }))
            }
            _ => {
                warn!("Discarding partially stored session");
                self.remove_all()?;
                Ok(None)
            }
        }
    }

    /// Persist a complete session, replacing whatever was stored.
    pub fn set(&self, session: &Session) -> Result<(), StorageError> {
        let _guard = self.guard();
        self.store(session)
    }

    fn store(&self, session: &Session) -> Result<(), StorageError> {
        self.storage.set_item(ACCESS_TOKEN_KEY, &session.access_token)?;
        self.storage.set_item(REFRESH_TOKEN_KEY, &session.refresh_token)?;
        self.storage.set_item(USER_ID_KEY, &session.user_id)?;
        self.storage.set_item(USER_EMAIL_KEY, &session.user_email)?;
        debug!(user_id = %session.user_id, "Session stored");
        Ok(())
    }

    /// Remove every session key. All removals are attempted; the first
    /// failure is reported.
    pub fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.guard();
        self.remove_all()
    }

    fn remove_all(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(e) = self.storage.remove_item(key) {
                warn!(key, error = %e, "Failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!("Session cleared");
                Ok(())
            }
        }
    }

    /// Swap in renewed tokens. Only the refresh protocol calls this.
    /// Returns the updated session, or `None` if there was nothing to update.
    pub fn update_tokens(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Option<Session>, StorageError> {
        let _guard = self.guard();
        let Some(mut session) = self.load()? else {
            return Ok(None);
        };
        session.access_token = access_token.to_string();
        if let Some(refresh) = refresh_token.filter(|r| !r.is_empty()) {
            session.refresh_token = refresh.to_string();
        }
        self.store(&session)?;
        Ok(Some(session))
    }

    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.get()?.map(|s| s.access_token))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.get(), Ok(Some(_)))
    }
}
