//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the auth-service base URL, request timeouts, the access-credential
//! validity window and which credential store backs the session.
//!
//! Configuration is stored at `~/.config/keyward/config.json`. The
//! `KEYWARD_API_BASE_URL` and `KEYWARD_CREDENTIAL_STORE` environment
//! variables override the file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config directory paths
const APP_NAME: &str = "keyward";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_API_BASE_URL: &str = "KEYWARD_API_BASE_URL";
pub const ENV_CREDENTIAL_STORE: &str = "KEYWARD_CREDENTIAL_STORE";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a login/register/refresh round trip before it counts as unavailable
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 30;

/// Remote logout is best-effort; don't hold the user up for long
const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 10;

/// Access credentials are issued for 15 minutes
const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 900;

/// Refresh this long before the access credential actually lapses
const DEFAULT_REFRESH_BUFFER_SECS: u64 = 60;

/// Where the refresh credential is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(StoreBackend::Keyring),
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown credential store '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub auth_timeout_secs: u64,
    pub logout_timeout_secs: u64,
    pub access_token_ttl_secs: u64,
    pub refresh_buffer_secs: u64,
    pub credential_store: StoreBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            logout_timeout_secs: DEFAULT_LOGOUT_TIMEOUT_SECS,
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            credential_store: StoreBackend::default(),
            last_email: None,
        }
    }
}

/// Timing knobs handed to the session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on login/register/refresh; exceeding it counts as `ServiceUnavailable`
    pub auth_timeout: Duration,
    /// Bound on the best-effort remote logout
    pub logout_timeout: Duration,
    /// How long an access credential is valid after issue
    pub access_token_ttl: Duration,
    /// Refresh this long before `access_token_ttl` runs out
    pub refresh_buffer: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Config::default().session_config()
    }
}

impl Config {
    /// Load the config file (defaults if absent), then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(backend) = var(ENV_CREDENTIAL_STORE) {
            match backend.parse() {
                Ok(backend) => self.credential_store = backend,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_CREDENTIAL_STORE),
            }
        }
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            auth_timeout: Duration::from_secs(self.auth_timeout_secs),
            logout_timeout: Duration::from_secs(self.logout_timeout_secs),
            access_token_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_buffer: Duration::from_secs(self.refresh_buffer_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_base_url": "https://auth.example.com"}"#)
            .expect("Failed to parse partial config");
        assert_eq!(config.api_base_url, "https://auth.example.com");
        assert_eq!(config.auth_timeout_secs, DEFAULT_AUTH_TIMEOUT_SECS);
        assert_eq!(config.credential_store, StoreBackend::Keyring);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            ENV_API_BASE_URL => Some("https://auth.example.com/".to_string()),
            ENV_CREDENTIAL_STORE => Some("FILE".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://auth.example.com");
        assert_eq!(config.credential_store, StoreBackend::File);
    }

    #[test]
    fn test_bad_store_override_is_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            ENV_CREDENTIAL_STORE => Some("floppy".to_string()),
            _ => None,
        });
        assert_eq!(config.credential_store, StoreBackend::Keyring);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_session_config_durations() {
        let session = Config::default().session_config();
        assert_eq!(session.access_token_ttl, Duration::from_secs(900));
        assert_eq!(session.refresh_buffer, Duration::from_secs(60));
        assert_eq!(session.logout_timeout, Duration::from_secs(10));
    }
}
