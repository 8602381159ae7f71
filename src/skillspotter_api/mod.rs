/// SkillSpotter API integration module
///
/// Resolves the backend location at runtime, talks to the API through a
/// single shared HTTP client and keeps the signed-in user in a reactive
/// session store.
///
/// ## Startup Flow
///
/// 1. Host builds a `ConfigResolver` from its injected/env sources
/// 2. First request (or an explicit `initialize`) fetches the config document once
/// 3. `SessionStore::restore` loads the persisted credential and probes `/auth/me`
/// 4. Later requests carry the credential; a 401 revokes it and redirects to login
pub mod admin;
pub mod client;
pub mod config;
pub mod interceptor;
pub mod jobs;
pub mod notifications;
pub mod resources;
pub mod resumes;
pub mod session;
pub mod token_storage;
pub mod types;

pub use client::{ClientBuilder, ClientOptions, RequestBody, RequestOptions, SkillSpotterClient};
pub use config::{ConfigResolver, ConfigSource, ConfigSources, EnvConfig, InjectedConfig, RuntimeConfig};
pub use interceptor::{AuthInterceptor, AuthMode, NavigationQueue, Navigator, TracingNavigator};
pub use resources::*;
pub use session::{AuthStatus, Session, SessionStore};
pub use token_storage::{select_storage_backend, CredentialStore};
pub use types::{ApiError, SkillSpotterError};
