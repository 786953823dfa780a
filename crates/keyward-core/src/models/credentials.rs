use std::fmt;

use serde::{Deserialize, Serialize};

/// Access and refresh credential issued as one unit.
///
/// The previous refresh credential stops working the moment a new pair is issued,
/// so both halves are always replaced together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Keep secrets out of logs and panic messages.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Body for both `/register` and `/login`.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Serialize)]
pub struct LogoutRequest<'a> {
    pub refresh_token: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_pair_ignores_token_type() {
        let json = r#"{"access_token":"A1","refresh_token":"R1","token_type":"bearer"}"#;
        let pair: CredentialPair = serde_json::from_str(json).expect("Failed to parse token pair");
        assert_eq!(pair, CredentialPair::new("A1", "R1"));
    }

    #[test]
    fn test_token_pair_requires_both_tokens() {
        let json = r#"{"access_token":"A1"}"#;
        assert!(serde_json::from_str::<CredentialPair>(json).is_err());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = CredentialPair::new("secret-access", "secret-refresh");
        let shown = format!("{:?}", pair);
        assert!(!shown.contains("secret"));
    }
}
