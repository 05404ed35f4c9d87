//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend URL, where the session is stored, and the
//! last email used to log in.
//!
//! Configuration is stored at `~/.config/splitledger/config.json`.
//! `SPLITLEDGER_API_URL` and `SPLITLEDGER_STORAGE` override the file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiClient, DEFAULT_BASE_URL};
use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, SessionStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "splitledger";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_URL: &str = "SPLITLEDGER_API_URL";
pub const ENV_STORAGE: &str = "SPLITLEDGER_STORAGE";

/// Where the session lives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown session storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub last_email: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.base_url = Some(url);
            }
        }
        if let Ok(storage) = std::env::var(ENV_STORAGE) {
            self.storage = storage.parse()?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Session store for the configured backend.
    pub fn session_store(&self) -> Result<SessionStore> {
        let storage: Arc<dyn SessionStorage> = match self.storage {
            StorageBackend::File => Arc::new(
                FileStorage::default_location().context("Failed to locate session file")?,
            ),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(SessionStore::new(storage))
    }

    /// API client wired to this configuration.
    pub fn api_client(&self, session: SessionStore) -> Result<ApiClient> {
        let mut builder = ApiClient::builder().base_url(self.base_url()).session(session);
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build().context("Failed to build API client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.storage, StorageBackend::File);
        assert!(config.last_email.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(APP_NAME).join(CONFIG_FILE);
        let config = Config {
            base_url: Some("https://split.example/api/v1".to_string()),
            storage: StorageBackend::Keyring,
            last_email: Some("ann@example.com".to_string()),
            request_timeout_secs: Some(5),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.base_url(), "https://split.example/api/v1");
        assert_eq!(loaded.storage, StorageBackend::Keyring);
        assert_eq!(loaded.request_timeout_secs, Some(5));
    }

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("File".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert_eq!("keychain".parse::<StorageBackend>().unwrap(), StorageBackend::Keyring);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_api_client_uses_configured_url() {
        let config = Config {
            base_url: Some("http://127.0.0.1:9/api/v1/".to_string()),
            ..Default::default()
        };
        let client = config.api_client(SessionStore::in_memory()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9/api/v1");
    }
}
