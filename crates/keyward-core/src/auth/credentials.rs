use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use super::CredentialStore;

const SERVICE_NAME: &str = "keyward";

/// Account name used when no profile name is configured
pub const DEFAULT_ACCOUNT: &str = "default";

/// Refresh credential kept in the OS keychain.
///
/// One keychain entry per account name, created once and reused so every
/// read and write goes through the same handle.
pub struct KeyringStore {
    entry: Entry,
}

impl KeyringStore {
    pub fn new(account: &str) -> Result<Self> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }

    /// Whether entries outlive the process. Without `native-keyring`, keyring
    /// falls back to its in-memory mock and nothing reaches the OS keychain.
    pub const fn is_persistent() -> bool {
        cfg!(feature = "native-keyring")
    }
}

impl CredentialStore for KeyringStore {
    /// Retrieve the refresh credential from the OS keychain
    fn load(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve refresh token from keychain"),
        }
    }

    /// Store the refresh credential in the OS keychain
    fn save(&self, refresh_token: &str) -> Result<()> {
        self.entry
            .set_password(refresh_token)
            .context("Failed to store refresh token in keychain")?;
        Ok(())
    }

    /// Delete the stored refresh credential
    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => {
                debug!("No keychain entry to delete");
                Ok(())
            }
            Err(e) => Err(e).context("Failed to delete refresh token from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_follows_native_feature() {
        assert_eq!(KeyringStore::is_persistent(), cfg!(feature = "native-keyring"));
    }

    #[cfg(feature = "native-keyring")]
    #[test]
    #[ignore = "needs an unlocked platform keychain"]
    fn test_token_survives_a_new_handle() {
        let account = format!("test-{}", std::process::id());
        let first = KeyringStore::new(&account).unwrap();
        first.save("R1").unwrap();

        let second = KeyringStore::new(&account).unwrap();
        assert_eq!(second.load().unwrap().as_deref(), Some("R1"));

        second.clear().unwrap();
        assert_eq!(first.load().unwrap(), None);
    }
}
