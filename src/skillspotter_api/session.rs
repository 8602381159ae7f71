//! Session store: the single source of truth for "who is logged in".
//!
//! ```text
//!            restore()                 login()/register()
//! Unknown ─────────────┬──> Anonymous ─────────────────────> Authenticated(user)
//!                      │        ^                                 │   │
//!                      │        └──── logout() / 401 / failed ────┘   │ update_profile()
//!                      └──────────────────────────────────────────>  ─┘
//! ```
//!
//! State is published through a `tokio::sync::watch` channel so UI code can
//! react to transitions, including the ones triggered by the interceptor.

use std::sync::Arc;
use tokio::sync::watch;

use crate::skillspotter_api::client::{RequestBody, RequestOptions, SkillSpotterClient};
use crate::skillspotter_api::token_storage::CredentialStore;
use crate::skillspotter_api::types::{
    ApiError, AuthResponse, ChangePasswordRequest, LoginRequest, ProfileUpdate, RegisterRequest,
    SkillSpotterError, User, UserPatch,
};
use crate::validation;

const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
const RESTORE_FAILED: &str = "Authentication failed. Please log in again.";
const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";
const REGISTER_FAILED: &str = "Registration failed. Please try again.";

/// Authentication state machine
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    /// Startup check has not completed yet
    Unknown,
    Anonymous,
    Authenticated(User),
}

/// Snapshot of the session as seen by the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub status: AuthStatus,
    /// An auth transition is in flight
    pub is_loading: bool,
    /// Message describing the most recent failed auth operation
    pub last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            status: AuthStatus::Unknown,
            is_loading: false,
            last_error: None,
        }
    }
}

impl Session {
    pub fn current_user(&self) -> Option<&User> {
        match &self.status {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status != AuthStatus::Unknown
    }
}

/// Session state shared by a client's interceptor and every store built on it
pub(crate) struct SessionCell {
    state: watch::Sender<Session>,
    credentials: CredentialStore,
}

impl SessionCell {
    pub(crate) fn new(credentials: CredentialStore) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { state, credentials }
    }

    pub(crate) fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub(crate) fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut Session)) {
        self.state.send_modify(f);
    }

    /// Drop the credential and user after the backend refused the session
    pub(crate) async fn revoke(&self) {
        if let Err(e) = self.credentials.clear().await {
            tracing::error!("Failed to clear stored credential after 401: {}", e);
        }
        self.update(|s| {
            s.status = AuthStatus::Anonymous;
            s.last_error = Some(SESSION_EXPIRED.to_string());
        });
    }
}

/// Login, registration, logout and profile actions over a shared session
///
/// Stores are cheap to clone; every store created from the same client
/// observes the same session.
///
/// # Example
///
/// ```no_run
/// use skillspotter_sdk::{SessionStore, SkillSpotterClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SkillSpotterClient::new("http://localhost:5000/api")?;
/// let session = SessionStore::new(&client);
///
/// session.restore().await;
/// if !session.is_authenticated() {
///     let user = session.login("ada@example.com", "secret").await?;
///     println!("Welcome back, {}", user.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionStore {
    client: SkillSpotterClient,
    cell: Arc<SessionCell>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.snapshot())
            .finish()
    }
}

impl SessionStore {
    pub fn new(client: &SkillSpotterClient) -> Self {
        Self {
            client: client.clone(),
            cell: client.session_cell(),
        }
    }

    /// Current session state
    pub fn snapshot(&self) -> Session {
        self.cell.snapshot()
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.cell.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.snapshot().current_user().cloned()
    }

    /// True iff a user is loaded *and* a credential is held
    pub fn is_authenticated(&self) -> bool {
        self.snapshot().current_user().is_some() && self.cell.credentials().is_present()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.snapshot().current_user().is_some_and(User::is_admin)
    }

    /// Startup check: restore a previous session from durable storage
    ///
    /// Never fails. Ends in `Authenticated` when a stored credential is
    /// accepted by the probe endpoint, otherwise in `Anonymous` with any
    /// stale credential removed.
    pub async fn restore(&self) -> Session {
        self.begin();

        let token = match self.cell.credentials().load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Stored credential unreadable, discarding it: {}", e);
                self.discard_credential().await;
                None
            }
        };

        if token.is_none() {
            tracing::debug!("No stored credential, session is anonymous");
            self.cell.update(|s| {
                s.status = AuthStatus::Anonymous;
                s.is_loading = false;
            });
            return self.snapshot();
        }

        match self.probe().await {
            Ok(user) => {
                tracing::info!("Session restored for user_id={}", user.id);
                self.cell.update(|s| {
                    s.status = AuthStatus::Authenticated(user);
                    s.is_loading = false;
                });
            }
            Err(e) => {
                tracing::info!("Stored credential rejected by probe: {}", e);
                self.discard_credential().await;
                self.cell.update(|s| {
                    s.status = AuthStatus::Anonymous;
                    s.is_loading = false;
                    s.last_error = Some(RESTORE_FAILED.to_string());
                });
            }
        }

        self.snapshot()
    }

    /// Re-run the probe for the current credential
    pub async fn refresh_user(&self) -> Result<User, SkillSpotterError> {
        if !self.cell.credentials().is_present() {
            return Err(SkillSpotterError::Unauthorized);
        }
        self.begin();

        let result = match self.probe().await {
            Ok(user) => {
                self.cell
                    .update(|s| s.status = AuthStatus::Authenticated(user.clone()));
                Ok(user)
            }
            Err(ApiError::Unauthorized { .. }) => {
                // The probe is exempt from the interceptor's 401 policy
                self.cell.revoke().await;
                Err(SkillSpotterError::Unauthorized)
            }
            Err(e) => Err(e.into()),
        };

        self.complete(result)
    }

    /// Authenticate with email and password
    ///
    /// On success the credential is persisted before the user becomes
    /// visible; on failure neither changes.
    ///
    /// # Arguments
    ///
    /// * `email` - Account email address
    /// * `password` - Account password
    ///
    /// # Returns
    ///
    /// Returns `Ok(User)` for the signed-in account, or
    /// `Err(SkillSpotterError::InvalidCredentials)` with the backend's message
    /// if the credentials are rejected.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use skillspotter_sdk::{SessionStore, SkillSpotterClient, SkillSpotterError};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = SkillSpotterClient::new("http://localhost:5000/api")?;
    /// let session = SessionStore::new(&client);
    ///
    /// match session.login("ada@example.com", "secret1").await {
    ///     Ok(user) => println!("Signed in as {}", user.name),
    ///     Err(SkillSpotterError::InvalidCredentials(msg)) => eprintln!("{}", msg),
    ///     Err(e) => return Err(e.into()),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SkillSpotterError> {
        tracing::debug!("Logging in: email={}", email);
        self.begin();

        let result = async {
            let body = RequestBody::json(&LoginRequest { email, password })?;
            self.establish("/auth/login", body, |e| match e {
                ApiError::Unauthorized { .. } | ApiError::Validation { .. } => {
                    SkillSpotterError::InvalidCredentials(
                        e.backend_message().unwrap_or(LOGIN_FAILED).to_string(),
                    )
                }
                other => other.into(),
            })
            .await
        }
        .await;

        self.complete(result)
    }

    /// Create an account and log into it
    ///
    /// Name, email syntax and password length are checked locally first;
    /// nothing is sent when they fail.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name
    /// * `email` - Account email address
    /// * `password` - Password, at least 6 characters
    ///
    /// # Returns
    ///
    /// Returns `Ok(User)` for the new, signed-in account,
    /// `Err(SkillSpotterError::Input)` if local validation fails, or
    /// `Err(SkillSpotterError::Validation)` with the backend's message (for
    /// example a duplicate email).
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, SkillSpotterError> {
        tracing::debug!("Registering: email={}", email);
        self.begin();

        let result = async {
            validation::validate_registration(name, email, password)?;
            let body = RequestBody::json(&RegisterRequest {
                name,
                email,
                password,
            })?;
            self.establish("/auth/register", body, |e| match e {
                ApiError::Unauthorized { .. } | ApiError::Validation { .. } => {
                    SkillSpotterError::Validation(
                        e.backend_message().unwrap_or(REGISTER_FAILED).to_string(),
                    )
                }
                other => other.into(),
            })
            .await
        }
        .await;

        self.complete(result)
    }

    /// End the session
    ///
    /// Local state is cleared even when the backend call fails; that call
    /// is only a notification. The only reported error is a failure to
    /// remove the persisted credential.
    pub async fn logout(&self) -> Result<(), SkillSpotterError> {
        self.begin();

        if let Err(e) = self
            .client
            .post::<serde_json::Value>("/auth/logout", RequestBody::Empty, RequestOptions::default())
            .await
        {
            tracing::warn!("Backend logout failed, clearing local session anyway: {}", e);
        }

        let cleared = self.cell.credentials().clear().await;
        self.cell.update(|s| {
            s.status = AuthStatus::Anonymous;
            s.is_loading = false;
            s.last_error = None;
        });

        match cleared {
            Ok(()) => {
                tracing::info!("Logged out");
                Ok(())
            }
            Err(e) => {
                self.cell.update(|s| s.last_error = Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Update the current user's profile, merging the returned fields
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, SkillSpotterError> {
        if !self.is_authenticated() {
            return Err(SkillSpotterError::Unauthorized);
        }
        self.begin();

        let result = async {
            if let Some(email) = update.email.as_deref() {
                validation::validate_email(email)?;
            }

            let patch: UserPatch = self
                .client
                .put("/auth/profile", RequestBody::json(&update)?, RequestOptions::default())
                .await
                .map_err(classify_session_error)?;
            if patch.is_empty() {
                return Err(SkillSpotterError::Api(ApiError::Schema(
                    "Profile response carried no user fields".to_string(),
                )));
            }

            let mut merged = None;
            self.cell.update(|s| {
                if let AuthStatus::Authenticated(user) = &mut s.status {
                    user.apply(patch);
                    merged = Some(user.clone());
                }
            });
            // A concurrent logout or 401 may have ended the session meanwhile
            merged.ok_or(SkillSpotterError::Unauthorized)
        }
        .await;

        self.complete(result)
    }

    /// Change the current user's password
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), SkillSpotterError> {
        if !self.is_authenticated() {
            return Err(SkillSpotterError::Unauthorized);
        }
        self.begin();

        let result = async {
            validation::validate_password(new_password)?;
            let body = RequestBody::json(&ChangePasswordRequest {
                current_password,
                new_password,
            })?;
            self.client
                .put::<serde_json::Value>("/auth/change-password", body, RequestOptions::default())
                .await
                .map_err(classify_session_error)?;
            Ok::<(), SkillSpotterError>(())
        }
        .await;

        self.complete(result)
    }

    /// Ask the probe endpoint who the current credential belongs to
    ///
    /// Network failures and timeouts are retried; HTTP errors are not.
    async fn probe(&self) -> Result<User, ApiError> {
        let options = self.client.options();
        let attempts = options.probe_retries + 1;
        let probe_path = options.probe_path.clone();

        let mut attempt = 1;
        loop {
            match self.client.get::<User>(&probe_path, None, None).await {
                Ok(user) => return Ok(user),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "Session probe attempt {}/{} failed: {}, retrying",
                        attempt,
                        attempts,
                        e
                    );
                    tokio::time::sleep(options.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn establish(
        &self,
        path: &str,
        body: RequestBody,
        classify: impl FnOnce(ApiError) -> SkillSpotterError,
    ) -> Result<User, SkillSpotterError> {
        let response: AuthResponse = self
            .client
            .post(path, body, RequestOptions::default())
            .await
            .map_err(classify)?;

        if response.token.trim().is_empty() {
            return Err(ApiError::Schema("Authentication response carried no token".to_string()).into());
        }

        self.cell.credentials().save(&response.token).await?;
        let user = response.user;
        self.cell
            .update(|s| s.status = AuthStatus::Authenticated(user.clone()));

        tracing::info!("Authenticated user_id={} role={:?}", user.id, user.role);
        Ok(user)
    }

    async fn discard_credential(&self) {
        if let Err(e) = self.cell.credentials().clear().await {
            tracing::error!("Failed to clear stale credential: {}", e);
        }
    }

    fn begin(&self) {
        self.cell.update(|s| {
            s.is_loading = true;
            s.last_error = None;
        });
    }

    fn complete<T>(&self, result: Result<T, SkillSpotterError>) -> Result<T, SkillSpotterError> {
        let last_error = result.as_ref().err().map(SkillSpotterError::user_message);
        if let Some(message) = &last_error {
            tracing::debug!("Session operation failed: {}", message);
        }
        self.cell.update(|s| {
            s.is_loading = false;
            if last_error.is_some() {
                s.last_error = last_error;
            }
        });
        result
    }
}

fn classify_session_error(err: ApiError) -> SkillSpotterError {
    match err {
        ApiError::Unauthorized { .. } => SkillSpotterError::Unauthorized,
        ApiError::Validation { ref message, .. } if !message.is_empty() => {
            SkillSpotterError::Validation(message.clone())
        }
        other => other.into(),
    }
}
