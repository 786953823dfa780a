use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use super::CredentialStore;

/// Application name used for the data directory path
const APP_NAME: &str = "keyward";

/// File holding the encrypted refresh credential
const TOKEN_FILE: &str = "refresh_token.bin";

/// On-disk layout version: version | salt | nonce | ciphertext
const FORMAT_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 1 + SALT_LEN + NONCE_LEN;

/// Refresh credential encrypted at rest with a passphrase-derived key.
///
/// The key is derived with Argon2 over the passphrase and a per-write random
/// salt; the payload is sealed with ChaCha20-Poly1305.
pub struct EncryptedFileStore {
    path: PathBuf,
    passphrase: String,
}

impl EncryptedFileStore {
    pub fn new(path: PathBuf, passphrase: impl Into<String>) -> Self {
        Self {
            path,
            passphrase: passphrase.into(),
        }
    }

    /// `<data_dir>/keyward/refresh_token.bin`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cipher(&self, salt: &[u8]) -> Result<ChaCha20Poly1305> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(self.passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow!("Failed to derive storage key: {}", e))?;
        Ok(ChaCha20Poly1305::new(Key::from_slice(&key)))
    }

    fn seal(&self, plaintext: &str) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher(&salt)?
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| anyhow!("Failed to encrypt refresh token"))?;

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, contents: &[u8]) -> Result<String> {
        if contents.len() <= HEADER_LEN {
            bail!("Credential file is truncated");
        }
        if contents[0] != FORMAT_VERSION {
            bail!("Unsupported credential file version {}", contents[0]);
        }

        let salt = &contents[1..1 + SALT_LEN];
        let nonce = &contents[1 + SALT_LEN..HEADER_LEN];
        let plaintext = self
            .cipher(salt)?
            .decrypt(Nonce::from_slice(nonce), &contents[HEADER_LEN..])
            .map_err(|_| anyhow!("Failed to decrypt credential file (wrong passphrase or corrupted)"))?;

        String::from_utf8(plaintext).context("Decrypted refresh token is not valid UTF-8")
    }
}

impl CredentialStore for EncryptedFileStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read credential file: {}", self.path.display()))?;
        self.open(&contents).map(Some)
    }

    fn save(&self, refresh_token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let sealed = self.seal(refresh_token)?;

        // Write next to the target, then rename, so a crash never leaves half a file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, sealed).context("Failed to write credential file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path).context("Failed to replace credential file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir, passphrase: &str) -> EncryptedFileStore {
        EncryptedFileStore::new(dir.path().join("nested").join(TOKEN_FILE), passphrase)
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "hunter22");
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "hunter22");

        store.save("R1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("R1"));

        store.save("R2").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("R2"));

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_token_not_stored_in_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "hunter22");
        store.save("very-recognisable-token").unwrap();

        let raw = std::fs::read(store.path()).unwrap();
        let needle = b"very-recognisable-token";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let dir = tempfile::tempdir().unwrap();
        store_in(&dir, "right-pass").save("R1").unwrap();

        let err = store_in(&dir, "wrong-pass").load().unwrap_err();
        assert!(err.to_string().contains("decrypt"));
    }

    #[test]
    fn test_truncated_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, "hunter22");
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), [FORMAT_VERSION, 0, 0]).unwrap();
        assert!(store.load().is_err());
    }
}
