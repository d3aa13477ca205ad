//! Field validators, run in a fixed order by the user workflows.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub const MIN_PASSWORD_CHARS: usize = 5;
pub const MAX_USERNAME_CHARS: usize = 64;
pub const MAX_EMAIL_CHARS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trims the submitted password and enforces the length policy.
/// Returns the trimmed value that should be hashed.
pub fn validate_password(raw: Option<&str>) -> Result<String, ValidationError> {
    let password = raw.unwrap_or_default().trim();
    if password.is_empty() {
        return Err(ValidationError::new("password", "Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::new(
            "password",
            "Password must be at least five characters",
        ));
    }
    Ok(password.to_string())
}

pub fn validate_username(raw: Option<&str>) -> Result<String, ValidationError> {
    let username = raw.unwrap_or_default().trim();
    if username.is_empty() {
        return Err(ValidationError::new("username", "Username is required"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "username",
            "Invalid username, only letters and numbers are allowed",
        ));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(ValidationError::new(
            "username",
            format!("Username must be at most {MAX_USERNAME_CHARS} characters"),
        ));
    }
    Ok(username.to_string())
}

pub fn validate_email(raw: Option<&str>) -> Result<String, ValidationError> {
    let email = raw.unwrap_or_default().trim();
    if email.is_empty() {
        return Err(ValidationError::new("email", "Email is required"));
    }
    if !is_valid_email(email) {
        return Err(ValidationError::new("email", "Invalid email address"));
    }
    if email.chars().count() > MAX_EMAIL_CHARS {
        return Err(ValidationError::new(
            "email",
            format!("Email must be at most {MAX_EMAIL_CHARS} characters"),
        ));
    }
    Ok(email.to_string())
}
