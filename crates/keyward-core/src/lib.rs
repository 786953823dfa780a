//! keyward-core - client-side session manager for a token-based auth service.
//!
//! Holds a short-lived access credential and a long-lived refresh credential
//! for one user, rotates them against the remote service, and makes sure that
//! any number of concurrent callers hitting an expired credential cause at
//! most one refresh.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use keyward_core::{AuthClient, Config, MemoryStore, SessionManager};
//!
//! let config = Config::load()?;
//! let client = AuthClient::new(&config.api_base_url, config.request_timeout())?;
//! let session = SessionManager::new(client, Arc::new(MemoryStore::new()), config.session_config());
//!
//! session.login("a@b.com", "correct horse").await?;
//! let profile = session.profile().await?;
//! println!("{}", profile.email);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;
pub mod utils;

pub use api::{AuthClient, AuthError};
pub use auth::{CredentialStore, EncryptedFileStore, KeyringStore, MemoryStore};
pub use config::{Config, SessionConfig, StoreBackend};
pub use models::{CredentialPair, Profile};
pub use session::{AuthorizedClient, LogoutOutcome, SessionManager, SessionSnapshot, SessionState};
