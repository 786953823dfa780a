use serde::Deserialize;
use thiserror::Error;

/// Outcome of a failed auth-service or session operation.
///
/// `Clone` so a single refresh result can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Rejected by server: {0}")]
    InvalidInput(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Session expired - please log in again")]
    RefreshTokenInvalid,

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Already logged in - log out first")]
    AlreadyAuthenticated,

    #[error("Another login is already in progress")]
    LoginInProgress,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Which remote operation produced a status, since 401 means different things to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    Refresh,
    Profile,
    Logout,
    Resource,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

impl AuthError {
    /// The session can't continue and the user must authenticate again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthError::RefreshTokenInvalid)
    }

    /// Worth retrying later; session state was left untouched.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull a human-readable message out of a `{"detail": ...}` error body.
    ///
    /// Handles both the plain string form and the list-of-field-errors form
    /// returned for request validation failures.
    fn detail_message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail? {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Array(errors) => {
                let messages: Vec<String> = errors
                    .iter()
                    .filter_map(|err| {
                        let field = err
                            .get("loc")
                            .and_then(|loc| loc.as_array())
                            .and_then(|loc| loc.last())
                            .and_then(|f| f.as_str());
                        let msg = err
                            .get("msg")
                            .or_else(|| err.get("message"))
                            .and_then(|m| m.as_str())?;
                        Some(match field {
                            Some(field) => format!("{}: {}", field, msg),
                            None => msg.to_string(),
                        })
                    })
                    .collect();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            _ => None,
        }
    }

    fn server_message(body: &str) -> String {
        Self::detail_message(body)
            .map(|m| Self::truncate_body(&m))
            .unwrap_or_else(|| Self::truncate_body(body))
    }

    pub fn from_status(op: Operation, status: reqwest::StatusCode, body: &str) -> Self {
        let code = status.as_u16();
        match (op, code) {
            (_, 408) | (_, 429) | (_, 500..=599) => {
                AuthError::ServiceUnavailable(format!("Status {}", status))
            }

            (Operation::Register, 400) | (Operation::Register, 409) => AuthError::EmailTaken,
            (Operation::Login, 401) => AuthError::InvalidCredentials,
            // Only a 401 means the refresh credential itself is spent
            (Operation::Refresh, 401) => AuthError::RefreshTokenInvalid,
            (_, 401) => AuthError::Unauthorized,
            (_, 403) => AuthError::AccessDenied(Self::server_message(body)),
            (_, 400) | (_, 422) => AuthError::InvalidInput(Self::server_message(body)),

            _ => AuthError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::InvalidResponse(e.to_string())
        } else {
            AuthError::ServiceUnavailable(e.to_string())
        }
    }
}
