//! Durable storage for the refresh credential.
//!
//! This module provides:
//! - `CredentialStore`: the load/save/clear contract the session manager depends on
//! - `MemoryStore`: volatile store for tests and throwaway sessions
//! - `KeyringStore`: OS-level credential storage via keyring
//! - `EncryptedFileStore`: passphrase-encrypted file for hosts without a keychain
//!
//! Only the refresh credential is ever persisted. The access credential lives
//! in memory for the lifetime of the process.

pub mod credentials;
pub mod file_store;
pub mod store;

pub use credentials::{KeyringStore, DEFAULT_ACCOUNT};
pub use file_store::EncryptedFileStore;
pub use store::{CredentialStore, MemoryStore};
