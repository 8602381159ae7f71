//! Validation error types for client-side input checks.
//!
//! These errors are produced before any request leaves the client, so the
//! UI can show them next to the offending form field.

use std::fmt;

/// Errors that can occur while validating user input.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field was left empty.
    MissingRequiredField {
        /// Name of the empty field (e.g., "name" or "email").
        field: String,
    },

    /// The email address is not syntactically valid.
    InvalidEmail {
        /// The rejected value.
        value: String,
    },

    /// The password is shorter than the minimum length.
    PasswordTooShort {
        /// Minimum number of characters required.
        min: usize,
    },

    /// The uploaded file's content type is not accepted.
    UnsupportedFileType {
        /// The content type that was supplied.
        content_type: String,
    },

    /// The uploaded file exceeds the maximum size.
    FileTooLarge {
        /// Size of the supplied file in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        max: usize,
    },

    /// No file content was supplied.
    EmptyFile,

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingRequiredField { field } => {
                write!(f, "The {} field is required", field)
            }
            ValidationError::InvalidEmail { value } => {
                write!(f, "'{}' is not a valid email address", value)
            }
            ValidationError::PasswordTooShort { min } => {
                write!(f, "Password must be at least {} characters", min)
            }
            ValidationError::UnsupportedFileType { content_type } => {
                write!(
                    f,
                    "File type '{}' not allowed. Please upload PDF, DOC, DOCX, TXT, or RTF file.",
                    content_type
                )
            }
            ValidationError::FileTooLarge { size, max } => {
                write!(
                    f,
                    "File too large ({} bytes). Maximum file size is {}MB.",
                    size,
                    max / (1024 * 1024)
                )
            }
            ValidationError::EmptyFile => write!(f, "No file selected"),
            ValidationError::Multiple(errors) => {
                writeln!(f, "Multiple validation errors occurred:")?;
                for (i, error) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_too_large_display() {
        let error = ValidationError::FileTooLarge {
            size: 6 * 1024 * 1024,
            max: 5 * 1024 * 1024,
        };
        let message = error.to_string();
        assert!(message.contains("6291456 bytes"));
        assert!(message.contains("5MB"));
    }

    #[test]
    fn test_multiple_errors_display() {
        let error = ValidationError::Multiple(vec![
            ValidationError::MissingRequiredField {
                field: "name".to_string(),
            },
            ValidationError::PasswordTooShort { min: 6 },
        ]);
        let message = error.to_string();
        assert!(message.contains("Multiple validation errors"));
        assert!(message.contains("1. The name field is required"));
        assert!(message.contains("2. Password must be at least 6"));
    }
}
