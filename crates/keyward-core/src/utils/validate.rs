use crate::api::AuthError;

/// Minimum password length the service accepts at registration
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum email length (RFC 5321 path limit)
const MAX_EMAIL_LENGTH: usize = 254;

/// Shallow email shape check: `local@domain.tld`, no whitespace.
/// The service does the authoritative validation.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let invalid = || AuthError::Validation("Please enter a valid email address".to_string());

    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    // Domain needs at least one dot with labels on both sides
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(AuthError::Validation("Please enter your password".to_string()));
    }
    Ok(())
}

pub fn validate_registration(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
