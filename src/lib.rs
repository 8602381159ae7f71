//! SkillSpotter SDK
//!
//! A Rust library for integrating with the SkillSpotter resume matching API.
//!
//! This SDK provides:
//! - Runtime discovery of the API base URL, fetched once and shared by every caller
//! - A single HTTP client with default headers, timeouts and an auth interceptor
//! - A reactive session store (login, register, logout, profile updates, restore)
//! - Secure credential storage via OS keychain with an encrypted-file fallback
//! - Typed wrappers for resumes, jobs, notifications and admin endpoints
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use skillspotter_sdk::{
//!     select_storage_backend, ConfigResolver, ConfigSources, SessionStore, SkillSpotterClient,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Resolve the backend location from the environment and the config document
//! let resolver = Arc::new(ConfigResolver::new(ConfigSources::from_env()));
//!
//! // Persist the credential in the OS keychain (or encrypted file fallback)
//! let storage = select_storage_backend("default").await?;
//! let client = SkillSpotterClient::builder(resolver).storage(storage).build()?;
//!
//! let session = SessionStore::new(&client);
//! session.restore().await;
//! if !session.is_authenticated() {
//!     let user = session.login("ada@example.com", "secret1").await?;
//!     println!("Signed in as {}", user.name);
//! }
//!
//! for resume in client.list_resumes().await? {
//!     println!("{} ({} skills)", resume.file_name, resume.extracted_skills.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod skillspotter_api;
pub mod storage;
pub mod validation;

// Re-export commonly used types and functions
pub use skillspotter_api::{
    client::{ClientBuilder, ClientOptions, RequestBody, RequestOptions, SkillSpotterClient},
    config::{
        ConfigDocument, ConfigResolver, ConfigSource, ConfigSources, EnvConfig, InjectedConfig,
        RuntimeConfig,
    },
    interceptor::{AuthMode, NavigationQueue, Navigator, TracingNavigator},
    resources::{
        AdminUser, Candidate, Dashboard, ExtractedSkills, Job, JobDraft, JobMatch, Notification,
        Resume, ResumeSkills, UploadResponse,
    },
    session::{AuthStatus, Session, SessionStore},
    token_storage::{select_storage_backend, CredentialStore, StoredCredential},
    types::{ApiError, AuthResponse, ProfileUpdate, Role, SkillSpotterError, User, UserPatch},
};
pub use storage::{StorageBackend, StorageError};
pub use validation::ValidationError;
