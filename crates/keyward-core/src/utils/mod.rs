//! Input checks run before any request leaves the process.

pub mod validate;

pub use validate::{validate_email, validate_login, validate_registration};
