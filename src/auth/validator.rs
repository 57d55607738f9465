//! Credential input validation
//!
//! Sanity checks applied to registration and login input before anything
//! reaches the password hasher or the database.

use crate::error::AuthError;

pub const MAX_USERNAME_LENGTH: usize = 64;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_SECRET_LENGTH: usize = 1024;

/// Characters never allowed in a username.
const RESERVED_USERNAME_CHARS: [char; 5] = ['@', '#', ',', '%', '/'];

/// Performs basic input sanitation to check for malformed values.
fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty()
        && input.len() <= max_length
        && !input.chars().any(|c| c.is_control())
}

/// Validates the shape of a username (not its existence).
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::InvalidInput("Username cannot be empty".into()));
    }

    if !is_valid_input(username, MAX_USERNAME_LENGTH) {
        return Err(AuthError::InvalidInput(format!(
            "Username must be 1-{} printable characters",
            MAX_USERNAME_LENGTH
        )));
    }

    if username.chars().any(char::is_whitespace) || username.contains(RESERVED_USERNAME_CHARS) {
        return Err(AuthError::InvalidInput(
            "Username contains whitespace or reserved characters".into(),
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if !is_valid_input(email, MAX_EMAIL_LENGTH) || email.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidInput("Invalid email format".into()));
    }
    Ok(())
}

/// Secrets may contain any characters except NUL; only emptiness and size are checked.
pub fn validate_secret(secret: &str) -> Result<(), AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidInput("Password cannot be empty".into()));
    }
    if secret.len() > MAX_SECRET_LENGTH || secret.contains('\0') {
        return Err(AuthError::InvalidInput("Invalid password format".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob_42").is_ok());
        assert!(validate_username("7eleven").is_ok());
    }

    #[test]
    fn rejects_malformed_usernames() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("alice@example").is_err());
        assert!(validate_username("a/b").is_err());
        assert!(validate_username("line\nbreak").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn secret_rules() {
        assert!(validate_secret("hunter2").is_ok());
        assert!(validate_secret("with spaces and ünïcode").is_ok());
        assert!(validate_secret("").is_err());
        assert!(validate_secret("nul\0byte").is_err());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("a b@example.com").is_err());
    }
}
