use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::skillspotter_api::config::{ConfigResolver, RuntimeConfig};
use crate::skillspotter_api::interceptor::{
    AuthInterceptor, AuthMode, Navigator, TracingNavigator, LOGIN_PATH, PROBE_PATH,
};
use crate::skillspotter_api::session::SessionCell;
use crate::skillspotter_api::token_storage::CredentialStore;
use crate::skillspotter_api::types::{ApiError, SkillSpotterError};
use crate::storage::StorageBackend;

/// Marker header identifying programmatic (non-navigation) requests
pub const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client-wide behaviour
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub auth_mode: AuthMode,
    pub timeout: Duration,
    /// Client-side route the interceptor redirects to on 401
    pub login_path: String,
    /// "Who am I" endpoint, exempt from the 401 redirect
    pub probe_path: String,
    /// Extra probe attempts after a network failure or timeout
    pub probe_retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auth_mode: AuthMode::default(),
            timeout: DEFAULT_TIMEOUT,
            login_path: LOGIN_PATH.to_string(),
            probe_path: PROBE_PATH.to_string(),
            probe_retries: 2,
            retry_delay: Duration::from_millis(250),
            user_agent: format!("skillspotter-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = path.into();
        self
    }

    pub fn with_probe_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.probe_retries = retries;
        self.retry_delay = delay;
        self
    }
}

/// Request payload
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    /// Sent as `multipart/form-data`; the JSON content type is not applied
    Multipart(reqwest::multipart::Form),
}

impl RequestBody {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::Request(format!("Failed to serialize request body: {}", e)))
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Headers applied after the defaults, replacing same-named ones
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    /// Overrides [`ClientOptions::timeout`]
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Builder for [`SkillSpotterClient`]
pub struct ClientBuilder {
    resolver: Arc<ConfigResolver>,
    credentials: Option<CredentialStore>,
    navigator: Option<Arc<dyn Navigator>>,
    options: ClientOptions,
}

impl ClientBuilder {
    /// Persist the credential in `backend`
    pub fn storage(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.credentials = Some(CredentialStore::new(backend));
        self
    }

    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<SkillSpotterClient, SkillSpotterError> {
        // The cookie store stays on in both auth modes so session cookies
        // set by the backend are replayed
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(self.options.user_agent.clone())
            .build()
            .map_err(|e| SkillSpotterError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = self.credentials.unwrap_or_else(CredentialStore::in_memory);
        let session = Arc::new(SessionCell::new(credentials));
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(TracingNavigator) as Arc<dyn Navigator>);

        let interceptor = AuthInterceptor::new(
            self.options.auth_mode,
            session.clone(),
            navigator,
            self.options.login_path.clone(),
            self.options.probe_path.clone(),
        );

        tracing::debug!(
            "Creating SkillSpotterClient: auth_mode={:?}, timeout={:?}",
            self.options.auth_mode,
            self.options.timeout
        );

        Ok(SkillSpotterClient {
            inner: Arc::new(ClientInner {
                resolver: self.resolver,
                http,
                interceptor,
                session,
                options: self.options,
            }),
        })
    }
}

/// HTTP client for the SkillSpotter API
///
/// Every request first waits for [`ConfigResolver::initialize`], so the
/// client is usable immediately at startup. Requests are resolved against
/// the runtime base URL, carry the default headers, pass through the auth
/// interceptor and fail with an [`ApiError`] on any non-2xx status.
///
/// Clones share the HTTP connection pool, the interceptor and the session.
#[derive(Clone)]
pub struct SkillSpotterClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    resolver: Arc<ConfigResolver>,
    http: reqwest::Client,
    interceptor: AuthInterceptor,
    session: Arc<SessionCell>,
    options: ClientOptions,
}

impl std::fmt::Debug for SkillSpotterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillSpotterClient")
            .field("config", &self.inner.resolver.get())
            .field("interceptor", &self.inner.interceptor)
            .finish()
    }
}

impl SkillSpotterClient {
    /// Start building a client over `resolver`
    ///
    /// # Arguments
    ///
    /// * `resolver` - Shared runtime configuration; requests wait for it to resolve
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use skillspotter_sdk::storage::MemoryStorage;
    /// use skillspotter_sdk::{ClientOptions, ConfigResolver, ConfigSources, SkillSpotterClient};
    ///
    /// let resolver = Arc::new(ConfigResolver::new(ConfigSources::from_env()));
    /// let client = SkillSpotterClient::builder(resolver)
    ///     .storage(Arc::new(MemoryStorage::new()))
    ///     .options(ClientOptions::new().with_timeout(Duration::from_secs(10)))
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder(resolver: Arc<ConfigResolver>) -> ClientBuilder {
        ClientBuilder {
            resolver,
            credentials: None,
            navigator: None,
            options: ClientOptions::default(),
        }
    }

    /// Client bound to a fixed base URL with an in-memory credential
    ///
    /// # Example
    ///
    /// ```no_run
    /// use skillspotter_sdk::SkillSpotterClient;
    ///
    /// let client = SkillSpotterClient::new("http://localhost:5000/api").unwrap();
    /// ```
    pub fn new(base_url: impl Into<String>) -> Result<Self, SkillSpotterError> {
        Self::builder(Arc::new(ConfigResolver::fixed(base_url))).build()
    }

    /// Resolved runtime configuration (resolving it if needed)
    pub async fn config(&self) -> Arc<RuntimeConfig> {
        self.inner.resolver.initialize().await
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub fn interceptor(&self) -> &AuthInterceptor {
        &self.inner.interceptor
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.inner.session.credentials()
    }

    pub(crate) fn session_cell(&self) -> Arc<SessionCell> {
        self.inner.session.clone()
    }

    /// `GET path` and parse the JSON response
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&[(&str, &str)]>,
        headers: Option<HeaderMap>,
    ) -> Result<T, ApiError> {
        let mut options = RequestOptions {
            headers: headers.unwrap_or_default(),
            ..RequestOptions::default()
        };
        if let Some(query) = query {
            options.query = query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }
        self.request_json(Method::GET, path, RequestBody::Empty, options)
            .await
    }

    /// `POST path` and parse the JSON response
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request_json(Method::POST, path, body, options).await
    }

    /// `PUT path` and parse the JSON response
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request_json(Method::PUT, path, body, options).await
    }

    /// `DELETE path` and parse the JSON response
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request_json(Method::DELETE, path, RequestBody::Empty, options)
            .await
    }

    /// `GET path` and return the raw body, for file downloads
    pub async fn download(&self, path: &str, options: RequestOptions) -> Result<Bytes, ApiError> {
        let response = self
            .send(Method::GET, path, RequestBody::Empty, options)
            .await?;
        response.bytes().await.map_err(|e| {
            tracing::error!("Failed to read download body for {}: {}", path, e);
            ApiError::from(e)
        })
    }

    /// Send a request through the full pipeline and return the raw response
    ///
    /// Non-2xx statuses are turned into errors after the interceptor has
    /// seen them.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<reqwest::Response, ApiError> {
        let config = self.inner.resolver.initialize().await;
        let url = join_url(&config.api_base_url, path)?;

        let mut headers = HeaderMap::new();
        if !matches!(body, RequestBody::Multipart(_)) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if method != Method::GET {
            headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
        }
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        self.inner.interceptor.authorize(&mut headers);

        let mut request = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .headers(headers)
            .timeout(options.timeout.unwrap_or(self.inner.options.timeout));
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        tracing::debug!("Sending {} {}", method, url);

        let response = request.send().await.map_err(|e| {
            tracing::error!("Request {} {} failed: {}", method, url, e);
            ApiError::from(e)
        })?;

        let status = response.status();
        tracing::debug!("Received {} for {} {}", status, method, path);

        self.inner.interceptor.on_response(status, path).await;

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                "{} {} failed: HTTP {} - {}",
                method,
                path,
                status.as_u16(),
                error_body
            );
            return Err(ApiError::from_status(status.as_u16(), &error_body));
        }

        Ok(response)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, body, options).await?;

        let text = response.text().await.map_err(|e| {
            tracing::error!("Failed to read response body for {}: {}", path, e);
            ApiError::from(e)
        })?;

        parse_body(path, &text)
    }
}

/// Parse a response body, treating an empty body as JSON `null`
fn parse_body<T: DeserializeOwned>(path: &str, text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| {
        tracing::error!("Unexpected response shape for {}: {} - Body: {}", path, e, text);
        ApiError::Schema(format!("Failed to parse response from {}: {}", path, e))
    })
}

/// Resolve `path` against the API base URL
///
/// Absolute URLs are accepted only on the base URL's origin; the
/// credential must never leave it.
fn join_url(base: &str, path: &str) -> Result<url::Url, ApiError> {
    let base_url =
        url::Url::parse(base).map_err(|e| ApiError::Request(format!("Invalid URL {}: {}", base, e)))?;

    if path.starts_with("http://") || path.starts_with("https://") {
        let url = url::Url::parse(path)
            .map_err(|e| ApiError::Request(format!("Invalid URL {}: {}", path, e)))?;
        if url.origin() != base_url.origin() {
            tracing::error!("Refusing request to {}: outside API origin {}", url, base);
            return Err(ApiError::Request(format!(
                "URL {} is outside the API origin",
                url
            )));
        }
        return Ok(url);
    }

    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url::Url::parse(&joined).map_err(|e| ApiError::Request(format!("Invalid URL {}: {}", joined, e)))
}

/// Encode `id` as exactly one path segment
///
/// Dot segments are refused since URL parsing would resolve them.
pub(crate) fn path_segment(id: &str) -> Result<String, ApiError> {
    if id.is_empty() || id == "." || id == ".." {
        return Err(ApiError::Request(format!("Invalid identifier {:?}", id)));
    }
    Ok(urlencoding::encode(id).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_keeps_base_path() {
        assert_eq!(
            join_url("https://x.example.com/prod/api/", "/resumes/42").unwrap().as_str(),
            "https://x.example.com/prod/api/resumes/42"
        );
        assert_eq!(
            join_url("https://x.example.com/api", "auth/me").unwrap().as_str(),
            "https://x.example.com/api/auth/me"
        );
        assert_eq!(
            join_url("https://x.example.com/api", "https://x.example.com/files/cv.pdf").unwrap().as_str(),
            "https://x.example.com/files/cv.pdf"
        );
        assert!(matches!(join_url("not a url", "/x"), Err(ApiError::Request(_))));
    }

    #[test]
    fn test_join_url_refuses_foreign_origin() {
        let base = "https://x.example.com/api";
        for foreign in [
            "https://other.example.com/file",
            "http://x.example.com/api/jobs",
            "https://x.example.com:8443/api/jobs",
        ] {
            assert!(
                matches!(join_url(base, foreign), Err(ApiError::Request(_))),
                "{} should be refused",
                foreign
            );
        }
    }

    #[test]
    fn test_path_segment_encodes_one_segment() {
        assert_eq!(path_segment("r-1").unwrap(), "r-1");
        assert_eq!(path_segment("../admin/users").unwrap(), "..%2Fadmin%2Fusers");
        assert_eq!(path_segment("a b?c#d").unwrap(), "a%20b%3Fc%23d");
        assert_eq!(path_segment("%2e%2e").unwrap(), "%252e%252e");
        for bad in ["", ".", ".."] {
            assert!(matches!(path_segment(bad), Err(ApiError::Request(_))));
        }
    }

    #[test]
    fn test_parse_body_empty_is_null() {
        parse_body::<()>("/auth/logout", "").unwrap();
        let value: serde_json::Value = parse_body("/auth/logout", "  ").unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_parse_body_schema_error() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            field: String,
        }
        let err = parse_body::<Needs>("/auth/me", r#"{"other":1}"#).unwrap_err();
        assert!(matches!(err, ApiError::Schema(ref m) if m.contains("/auth/me")));
    }

    #[test]
    fn test_options_builders() {
        let options = ClientOptions::new()
            .with_auth_mode(AuthMode::CookieSession)
            .with_timeout(Duration::from_secs(5))
            .with_probe_retries(0, Duration::from_millis(1));
        assert_eq!(options.auth_mode, AuthMode::CookieSession);
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.probe_path, PROBE_PATH);
        assert_eq!(options.probe_retries, 0);

        let request = RequestOptions::new()
            .with_query("page", "2")
            .with_header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"));
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(request.headers.get("x-trace").unwrap(), "abc");
    }
}
