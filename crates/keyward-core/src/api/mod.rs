//! REST client module for the authorization service.
//!
//! This module provides the `AuthClient` for the register, login, refresh,
//! profile and logout endpoints, plus the `AuthError` taxonomy every
//! remote failure is mapped into.
//!
//! Protected endpoints use bearer authentication with the access
//! credential the caller supplies.

pub mod client;
pub mod error;

pub use client::AuthClient;
pub use error::{AuthError, Operation};
