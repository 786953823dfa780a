use std::sync::Mutex;

use anyhow::{anyhow, Result};

/// Durable home of the refresh credential.
///
/// Implementations are called while the session manager holds its lock, so
/// they need no synchronisation of their own beyond being `Send + Sync`.
/// Errors are reported to the caller but never end a live session.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted refresh credential, `None` if there is none
    fn load(&self) -> Result<Option<String>>;

    /// Persist `refresh_token`, replacing any previous value
    fn save(&self, refresh_token: &str) -> Result<()>;

    /// Forget the persisted credential. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a credential already "persisted", as after a previous run
    pub fn with_token(refresh_token: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(refresh_token.into())),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        let value = self.value.lock().map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(value.clone())
    }

    fn save(&self, refresh_token: &str) -> Result<()> {
        let mut value = self.value.lock().map_err(|_| anyhow!("Memory store lock poisoned"))?;
        *value = Some(refresh_token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut value = self.value.lock().map_err(|_| anyhow!("Memory store lock poisoned"))?;
        *value = None;
        Ok(())
    }
}
