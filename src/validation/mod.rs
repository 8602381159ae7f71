//! Client-side input validation.
//!
//! Mirrors the checks the backend performs so obviously bad input is
//! rejected without a round trip: email syntax, minimum password length,
//! and the resume upload whitelist.
//!
//! # Example
//!
//! ```
//! use skillspotter_sdk::validation::{validate_email, validate_password};
//!
//! assert!(validate_email("ada@example.com").is_ok());
//! assert!(validate_password("12345").is_err());
//! ```

pub mod error;

pub use error::ValidationError;

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum resume upload size (5 MiB)
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Content types accepted for resume uploads
pub const ALLOWED_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/rtf",
];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// Validate email syntax.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "email".to_string(),
        });
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail {
            value: email.to_string(),
        });
    }
    Ok(())
}

/// Validate password length.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Validate a registration form, collecting every failure.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push(ValidationError::MissingRequiredField {
            field: "name".to_string(),
        });
    }
    if let Err(e) = validate_email(email) {
        errors.push(e);
    }
    if let Err(e) = validate_password(password) {
        errors.push(e);
    }

    collect(errors)
}

/// Validate a resume upload by content type and size.
pub fn validate_upload(content_type: &str, size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if !ALLOWED_FILE_TYPES.contains(&content_type) {
        return Err(ValidationError::UnsupportedFileType {
            content_type: content_type.to_string(),
        });
    }
    if size > MAX_UPLOAD_SIZE {
        return Err(ValidationError::FileTooLarge {
            size,
            max: MAX_UPLOAD_SIZE,
        });
    }
    Ok(())
}

/// Guess an upload content type from a file name's extension.
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "txt" => Some("text/plain"),
        "rtf" => Some("application/rtf"),
        _ => None,
    }
}

fn collect(mut errors: Vec<ValidationError>) -> Result<(), ValidationError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
