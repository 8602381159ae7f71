use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::storage::StorageError;
use crate::validation::ValidationError;

/// SkillSpotter SDK error type
///
/// Represents every failure a caller of the session store or the endpoint
/// wrappers can observe. Transport and HTTP problems are nested in
/// [`ApiError`]; session-level outcomes get their own variants so UI code
/// can branch on them without inspecting status codes.
#[derive(Debug)]
pub enum SkillSpotterError {
    /// The backend rejected the supplied email/password
    InvalidCredentials(String),
    /// The backend rejected the request payload (4xx with a message)
    Validation(String),
    /// No valid session exists for an operation that requires one
    Unauthorized,
    /// Local input validation failed before any request was sent
    Input(ValidationError),
    /// API request failed (network, HTTP, or response parsing error)
    Api(ApiError),
    /// Credential storage operation failed
    Storage(StorageError),
    /// Configuration error
    Config(String),
}

impl SkillSpotterError {
    /// Human-readable message suitable for surfacing in a toast or form
    pub fn user_message(&self) -> String {
        match self {
            SkillSpotterError::InvalidCredentials(msg) | SkillSpotterError::Validation(msg) => {
                msg.clone()
            }
            SkillSpotterError::Unauthorized => {
                "Your session has expired. Please log in again.".to_string()
            }
            SkillSpotterError::Input(err) => err.to_string(),
            SkillSpotterError::Api(err) => err.user_message(),
            SkillSpotterError::Storage(_) | SkillSpotterError::Config(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl fmt::Display for SkillSpotterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkillSpotterError::InvalidCredentials(msg) => write!(f, "Invalid credentials: {}", msg),
            SkillSpotterError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            SkillSpotterError::Unauthorized => write!(f, "Unauthorized: no valid session"),
            SkillSpotterError::Input(err) => write!(f, "Invalid input: {}", err),
            SkillSpotterError::Api(err) => write!(f, "API error: {}", err),
            SkillSpotterError::Storage(err) => write!(f, "Storage error: {}", err),
            SkillSpotterError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SkillSpotterError {}

impl From<ApiError> for SkillSpotterError {
    fn from(err: ApiError) -> Self {
        SkillSpotterError::Api(err)
    }
}

impl From<StorageError> for SkillSpotterError {
    fn from(err: StorageError) -> Self {
        SkillSpotterError::Storage(err)
    }
}

impl From<ValidationError> for SkillSpotterError {
    fn from(err: ValidationError) -> Self {
        SkillSpotterError::Input(err)
    }
}

/// API-specific errors
#[derive(Debug)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, TLS, ...)
    Network(String),
    /// The request did not complete within the configured timeout
    Timeout,
    /// HTTP 401
    Unauthorized { message: String },
    /// HTTP 4xx other than 401, carrying the backend-provided message
    Validation { status: u16, message: String },
    /// HTTP 5xx
    Server { status: u16, message: String },
    /// Any other non-success status
    Http { status: u16, message: String },
    /// The response body did not match the expected schema
    Schema(String),
    /// Request building failed
    Request(String),
}

impl ApiError {
    /// Classify a non-success HTTP status and its raw body
    ///
    /// The backend reports failures as `{"error": "..."}` (sometimes
    /// `{"message": "..."}`); anything else is carried through verbatim.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body);
        match status {
            401 => ApiError::Unauthorized { message },
            400..=499 => ApiError::Validation { status, message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Http { status, message },
        }
    }

    /// HTTP status code, when the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Validation { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend-provided message, when there is one
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Validation { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::Http { message, .. } => {
                if message.is_empty() {
                    None
                } else {
                    Some(message.as_str())
                }
            }
            _ => None,
        }
    }

    /// Whether retrying the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout)
    }

    /// Generic, user-facing translation of the failure
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) | ApiError::Timeout => {
                "Unable to reach the server. Please try again.".to_string()
            }
            ApiError::Validation { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Unauthorized { .. } => {
                "Your session has expired. Please log in again.".to_string()
            }
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Timeout => write!(f, "Request timed out"),
            ApiError::Unauthorized { message } => write!(f, "HTTP 401 error: {}", message),
            ApiError::Validation { status, message }
            | ApiError::Server { status, message }
            | ApiError::Http { status, message } => {
                write!(f, "HTTP {} error: {}", status, message)
            }
            ApiError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ApiError::Request(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else if err.is_decode() {
            ApiError::Schema(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::from_status(status.as_u16(), &err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

fn extract_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => body.trim().to_string(),
    }
}

/// Role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Authenticated user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "userId", deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

impl User {
    /// Whether this account may use the admin panel
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Merge the fields present in `patch`, keeping everything else
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(id) = patch.id {
            self.id = id;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = Some(created_at);
        }
    }
}

/// Partial user record returned by `PUT /auth/profile`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, alias = "userId", deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

impl UserPatch {
    /// True when no user field was present in the response
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.created_at.is_none()
    }
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Request payload for `POST /auth/login`
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Request payload for `POST /auth/register`
#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Request payload for `PUT /auth/change-password`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

/// Response from the login and register endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {}",
            other
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ApiError::from_status(401, r#"{"error":"Not logged in"}"#),
            ApiError::Unauthorized { ref message } if message == "Not logged in"
        ));
        assert!(matches!(
            ApiError::from_status(409, r#"{"error":"Email already registered"}"#),
            ApiError::Validation { status: 409, ref message } if message == "Email already registered"
        ));
        assert!(matches!(
            ApiError::from_status(503, "upstream unavailable"),
            ApiError::Server { status: 503, ref message } if message == "upstream unavailable"
        ));
    }

    #[test]
    fn test_error_message_prefers_error_field() {
        let err = ApiError::from_status(400, r#"{"message":"m","error":"e"}"#);
        assert_eq!(err.backend_message(), Some("e"));

        let err = ApiError::from_status(400, r#"{"message":"only message"}"#);
        assert_eq!(err.backend_message(), Some("only message"));
    }

    #[test]
    fn test_user_message_is_generic_for_server_faults() {
        let err = ApiError::from_status(500, r#"{"error":"stack trace here"}"#);
        assert_eq!(err.user_message(), "Something went wrong. Please try again later.");
        assert_eq!(
            ApiError::Timeout.user_message(),
            "Unable to reach the server. Please try again."
        );
        assert!(ApiError::Timeout.is_transient());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_user_accepts_numeric_and_legacy_ids() {
        let user: User = serde_json::from_value(json!({
            "id": 1,
            "name": "Ada",
            "email": "ada@example.com",
            "role": "admin",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(user.id, "1");
        assert!(user.is_admin());

        let user: User = serde_json::from_value(json!({
            "userId": "u-42",
            "name": "Grace",
            "email": "grace@example.com"
        }))
        .unwrap();
        assert_eq!(user.id, "u-42");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.created_at, None);
    }

    #[test]
    fn test_user_apply_merges_present_fields_only() {
        let mut user = User {
            id: "1".to_string(),
            name: "Old".to_string(),
            email: "a@b.com".to_string(),
            role: Role::User,
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
        };
        let patch: UserPatch = serde_json::from_value(json!({"name": "New Name"})).unwrap();
        user.apply(patch);

        assert_eq!(user.id, "1");
        assert_eq!(user.name, "New Name");
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let body = serde_json::to_value(ProfileUpdate::name("New Name")).unwrap();
        assert_eq!(body, json!({"name": "New Name"}));
    }

    #[test]
    fn test_user_patch_without_user_fields_is_empty() {
        let wrapped: UserPatch = serde_json::from_value(json!({
            "message": "Profile updated",
            "user": {"name": "New Name"}
        }))
        .unwrap();
        assert!(wrapped.is_empty());

        let flat: UserPatch = serde_json::from_value(json!({"name": "New Name"})).unwrap();
        assert!(!flat.is_empty());
    }
}
