use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::sync::{Arc, Mutex};

use crate::skillspotter_api::session::SessionCell;

/// Client-side route of the login entry point
pub const LOGIN_PATH: &str = "/login";

/// The "who am I" probe used to check for an existing session
pub const PROBE_PATH: &str = "/auth/me";

/// How the session credential travels to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// `Authorization: Bearer <token>` on every request
    #[default]
    BearerHeader,
    /// Rely on the session cookie alone; no authorization header is added
    CookieSession,
}

/// Host hook for client-side redirects
///
/// A browser host changes `window.location`; a CLI might print a prompt; a
/// TUI might switch screens.
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Navigator that only logs the redirect
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, location: &str) {
        tracing::warn!("Session is no longer valid, redirecting to {}", location);
    }
}

/// Navigator that queues redirects for hosts without a router to poll
#[derive(Debug, Default)]
pub struct NavigationQueue {
    pending: Mutex<Vec<String>>,
}

impl NavigationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued location, oldest first
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn is_empty(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

impl Navigator for NavigationQueue {
    fn navigate(&self, location: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(location.to_string());
    }
}

/// What the interceptor did with a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    /// Nothing to do
    PassThrough,
    /// 401 on the probe endpoint: an expected "not logged in" answer
    ProbeUnauthorized,
    /// 401 elsewhere: session cleared and login redirect issued
    SessionRevoked,
}

/// Cross-cutting request/response policy
///
/// Exactly one interceptor sits in each client's request pipeline. Every
/// request made through [`crate::SkillSpotterClient`] passes through
/// [`AuthInterceptor::authorize`] before it is sent and through
/// [`AuthInterceptor::on_response`] once a status is known.
pub struct AuthInterceptor {
    mode: AuthMode,
    session: Arc<SessionCell>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    probe_path: String,
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("mode", &self.mode)
            .field("login_path", &self.login_path)
            .field("probe_path", &self.probe_path)
            .finish()
    }
}

impl AuthInterceptor {
    pub(crate) fn new(
        mode: AuthMode,
        session: Arc<SessionCell>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
        probe_path: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            session,
            navigator,
            login_path: login_path.into(),
            probe_path: probe_path.into(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Attach the bearer credential, in header mode and when one is held
    ///
    /// An `Authorization` header supplied by the caller is left untouched.
    pub fn authorize(&self, headers: &mut HeaderMap) {
        if self.mode != AuthMode::BearerHeader || headers.contains_key(AUTHORIZATION) {
            return;
        }

        let Some(token) = self.session.credentials().current() else {
            return;
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => {
                tracing::error!("Stored credential is not a valid header value: {}", e);
            }
        }
    }

    /// Apply the global 401 policy to a response for `path`
    pub async fn on_response(&self, status: StatusCode, path: &str) -> ResponseAction {
        if status != StatusCode::UNAUTHORIZED {
            return ResponseAction::PassThrough;
        }

        if self.is_probe(path) {
            tracing::debug!("Probe endpoint answered 401, treating as not logged in");
            return ResponseAction::ProbeUnauthorized;
        }

        tracing::info!("Received 401 for {}, clearing session", path);
        self.session.revoke().await;
        self.navigator.navigate(&self.login_path);
        ResponseAction::SessionRevoked
    }

    /// Whether `path` addresses the probe endpoint (query string ignored)
    pub fn is_probe(&self, path: &str) -> bool {
        normalize(path) == normalize(&self.probe_path)
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let path = path.trim_end_matches('/');
    path.strip_prefix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skillspotter_api::session::AuthStatus;
    use crate::skillspotter_api::token_storage::CredentialStore;

    fn interceptor(mode: AuthMode) -> (AuthInterceptor, Arc<SessionCell>, Arc<NavigationQueue>) {
        let cell = Arc::new(SessionCell::new(CredentialStore::in_memory()));
        let navigator = Arc::new(NavigationQueue::new());
        let interceptor =
            AuthInterceptor::new(mode, cell.clone(), navigator.clone(), LOGIN_PATH, PROBE_PATH);
        (interceptor, cell, navigator)
    }

    #[tokio::test]
    async fn test_authorize_attaches_bearer_token() {
        let (interceptor, cell, _) = interceptor(AuthMode::BearerHeader);

        let mut headers = HeaderMap::new();
        interceptor.authorize(&mut headers);
        assert!(headers.get(AUTHORIZATION).is_none());

        cell.credentials().save("t1").await.unwrap();
        interceptor.authorize(&mut headers);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer t1");
    }

    #[tokio::test]
    async fn test_cookie_mode_never_attaches_header() {
        let (interceptor, cell, _) = interceptor(AuthMode::CookieSession);
        cell.credentials().save("t1").await.unwrap();

        let mut headers = HeaderMap::new();
        interceptor.authorize(&mut headers);
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_explicit_authorization_header_wins() {
        let (interceptor, cell, _) = interceptor(AuthMode::BearerHeader);
        cell.credentials().save("t1").await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        interceptor.authorize(&mut headers);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer other");
    }

    #[tokio::test]
    async fn test_401_revokes_session_and_redirects() {
        let (interceptor, cell, navigator) = interceptor(AuthMode::BearerHeader);
        cell.credentials().save("t1").await.unwrap();

        let action = interceptor
            .on_response(StatusCode::UNAUTHORIZED, "/resumes/42")
            .await;

        assert_eq!(action, ResponseAction::SessionRevoked);
        assert_eq!(navigator.drain(), vec![LOGIN_PATH.to_string()]);
        assert!(!cell.credentials().is_present());
        assert_eq!(cell.snapshot().status, AuthStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_401_on_probe_does_not_redirect() {
        let (interceptor, cell, navigator) = interceptor(AuthMode::BearerHeader);
        cell.credentials().save("t1").await.unwrap();

        for path in ["/auth/me", "auth/me", "/auth/me/", "/auth/me?fresh=1"] {
            let action = interceptor.on_response(StatusCode::UNAUTHORIZED, path).await;
            assert_eq!(action, ResponseAction::ProbeUnauthorized, "path {}", path);
        }

        assert!(navigator.is_empty());
        assert!(cell.credentials().is_present());
    }

    #[tokio::test]
    async fn test_other_statuses_pass_through() {
        let (interceptor, _, navigator) = interceptor(AuthMode::BearerHeader);

        for status in [StatusCode::OK, StatusCode::FORBIDDEN, StatusCode::INTERNAL_SERVER_ERROR] {
            let action = interceptor.on_response(status, "/jobs").await;
            assert_eq!(action, ResponseAction::PassThrough);
        }
        assert!(navigator.is_empty());
    }

    #[test]
    fn test_probe_matching_is_exact() {
        let (interceptor, _, _) = interceptor(AuthMode::BearerHeader);
        assert!(interceptor.is_probe("/auth/me"));
        assert!(!interceptor.is_probe("/auth/me/settings"));
        assert!(!interceptor.is_probe("/admin/auth/me"));
    }
}
