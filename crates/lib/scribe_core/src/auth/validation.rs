//! Input validation for account fields.

use std::sync::LazyLock;

use regex::Regex;

use super::{AuthError, AuthResult};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 72;
const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("Invalid regex")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("Invalid regex"));

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn validate_email(email: &str) -> AuthResult<()> {
    if email.is_empty() {
        return Err(AuthError::validation("email", "Email is required"));
    }
    if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
        return Err(AuthError::validation("email", "Invalid email format"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> AuthResult<()> {
    if !USERNAME_RE.is_match(username) {
        return Err(AuthError::validation(
            "username",
            "Username must be 3-30 characters of letters, digits or underscores",
        ));
    }
    Ok(())
}

/// At least 8 characters with an uppercase letter, a lowercase letter and a
/// digit. bcrypt ignores input past 72 bytes, so longer passwords are refused.
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(
            "password",
            "Password must be at least 8 characters long",
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AuthError::validation(
            "password",
            "Password must be at most 72 bytes long",
        ));
    }
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(upper && lower && digit) {
        return Err(AuthError::validation(
            "password",
            "Password must contain an uppercase letter, a lowercase letter and a digit",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a.b+tag@sub.example.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("al ice@example.com").is_err());
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("alice-01").is_err());
    }

    #[test]
    fn password_strength() {
        assert!(validate_password("Passw0rd").is_ok());
        assert!(validate_password("Pass0").is_err());
        assert!(validate_password("password1").is_err());
        assert!(validate_password("PASSWORD1").is_err());
        assert!(validate_password("Password").is_err());
        assert!(validate_password(&format!("Aa1{}", "x".repeat(80))).is_err());
    }

    #[test]
    fn password_minimum_counts_characters_not_bytes() {
        // 7 characters, 8 bytes
        assert!(validate_password("Pässw0r").is_err());
        assert!(validate_password("Pässw0rd").is_ok());
    }

    #[test]
    fn validation_error_names_field() {
        match validate_password("short") {
            Err(AuthError::Validation { field, .. }) => assert_eq!(field, "password"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
