//! Data models exchanged with the authorization service.
//!
//! - `CredentialPair`: access + refresh credential issued together
//! - `Profile`: the logged-in user as returned by `/me`
//! - Request bodies for register/login/refresh/logout

pub mod credentials;
pub mod profile;

pub use credentials::{CredentialPair, LoginRequest, LogoutRequest, RefreshRequest};
pub use profile::Profile;
