//! Session management for the single logged-in user.
//!
//! This module provides:
//! - `SessionManager`: the state machine owning both credentials, with
//!   single-flight refresh
//! - `AuthorizedClient`: runs protected requests and retries once after a 401
//! - `SessionState` / `SessionSnapshot`: what callers may observe
//!
//! The access credential is only ever held in memory. The refresh
//! credential is mirrored to a `CredentialStore` on every change.

pub mod manager;
pub mod request;
pub mod state;

pub use manager::{LogoutOutcome, SessionManager};
pub use request::AuthorizedClient;
pub use state::{SessionSnapshot, SessionState};
