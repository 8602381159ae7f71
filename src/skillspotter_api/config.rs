//! Runtime configuration discovery.
//!
//! The same client build can talk to different backends per deployment.
//! The backend base URL is resolved once per [`ConfigResolver`] from, in
//! priority order:
//!
//! 1. the config document served by the hosting origin (`/api-config`)
//! 2. the injected configuration object handed over by the host
//! 3. the `SKILLSPOTTER_API_URL` environment variable (runtime, then build time)
//! 4. [`FALLBACK_API_URL`]
//!
//! Auxiliary values (region, buckets, environment tag, version) are looked
//! up independently through the same sources.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use crate::skillspotter_api::types::{ApiError, SkillSpotterError};

/// Base URL used when no source provides one
pub const FALLBACK_API_URL: &str = "http://localhost:5000/api";

/// Path of the config document relative to the hosting origin
pub const DEFAULT_CONFIG_PATH: &str = "/api-config";

/// Region used when no source provides one
pub const DEFAULT_REGION: &str = "us-east-1";

pub const API_URL_ENV: &str = "SKILLSPOTTER_API_URL";
pub const REGION_ENV: &str = "SKILLSPOTTER_AWS_REGION";
pub const RESUME_BUCKET_ENV: &str = "SKILLSPOTTER_RESUME_BUCKET";
pub const JOB_DESC_BUCKET_ENV: &str = "SKILLSPOTTER_JOB_DESC_BUCKET";
pub const ENVIRONMENT_ENV: &str = "SKILLSPOTTER_ENVIRONMENT";
pub const VERSION_ENV: &str = "SKILLSPOTTER_VERSION";

/// Process-wide configuration, immutable once resolved
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub api_base_url: String,
    pub region: Option<String>,
    pub resume_bucket: Option<String>,
    pub job_desc_bucket: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    /// Which source supplied `api_base_url`
    pub source: ConfigSource,
}

/// Origin of the resolved base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Document,
    Injected,
    Environment,
    Fallback,
    /// Supplied up front through [`ConfigResolver::fixed`]
    Fixed,
}

/// Config document served by the hosting origin
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub resume_bucket: Option<String>,
    #[serde(default)]
    pub job_desc_bucket: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Configuration object injected by the host before the client starts
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    /// Overrides [`DEFAULT_CONFIG_PATH`]
    #[serde(default)]
    pub api_config_path: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub resume_bucket: Option<String>,
    #[serde(default)]
    pub job_desc_bucket: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
}

impl InjectedConfig {
    /// Parse an injected configuration object from JSON
    pub fn from_json(json: &str) -> Result<Self, SkillSpotterError> {
        serde_json::from_str(json)
            .map_err(|e| SkillSpotterError::Config(format!("Invalid injected config: {}", e)))
    }

    /// Read an injected configuration object from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SkillSpotterError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SkillSpotterError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }
}

/// Values taken from the environment
///
/// Each field prefers the runtime variable and falls back to the value
/// baked in at compile time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub api_url: Option<String>,
    pub region: Option<String>,
    pub resume_bucket: Option<String>,
    pub job_desc_bucket: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env_or_build(API_URL_ENV, option_env!("SKILLSPOTTER_API_URL")),
            region: env_or_build(REGION_ENV, option_env!("SKILLSPOTTER_AWS_REGION")),
            resume_bucket: env_or_build(RESUME_BUCKET_ENV, option_env!("SKILLSPOTTER_RESUME_BUCKET")),
            job_desc_bucket: env_or_build(
                JOB_DESC_BUCKET_ENV,
                option_env!("SKILLSPOTTER_JOB_DESC_BUCKET"),
            ),
            environment: env_or_build(ENVIRONMENT_ENV, option_env!("SKILLSPOTTER_ENVIRONMENT")),
            version: env_or_build(VERSION_ENV, option_env!("SKILLSPOTTER_VERSION")),
        }
    }
}

fn env_or_build(name: &str, build_time: Option<&'static str>) -> Option<String> {
    std::env::var(name)
        .ok()
        .or_else(|| build_time.map(str::to_string))
        .and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Where the resolver looks, and how hard it tries
#[derive(Debug, Clone)]
pub struct ConfigSources {
    /// Hosting origin serving the config document; `None` skips the fetch
    pub origin: Option<Url>,
    pub injected: Option<InjectedConfig>,
    pub env: EnvConfig,
    pub fetch_timeout: Duration,
    /// Extra attempts after a network failure or timeout
    pub fetch_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            origin: None,
            injected: None,
            env: EnvConfig::default(),
            fetch_timeout: Duration::from_secs(10),
            fetch_retries: 2,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl ConfigSources {
    /// Sources with environment values loaded and nothing else set
    pub fn from_env() -> Self {
        Self {
            env: EnvConfig::from_env(),
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_injected(mut self, injected: InjectedConfig) -> Self {
        self.injected = Some(injected);
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = env;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_fetch_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.fetch_retries = retries;
        self.retry_delay = delay;
        self
    }

    fn config_document_url(&self) -> Option<Url> {
        let origin = self.origin.as_ref()?;
        let path = self
            .injected
            .as_ref()
            .and_then(|i| i.api_config_path.as_deref())
            .unwrap_or(DEFAULT_CONFIG_PATH);
        match origin.join(path) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Invalid config document path {:?}: {}", path, e);
                None
            }
        }
    }
}

/// Resolves [`RuntimeConfig`] exactly once
///
/// Concurrent callers of [`ConfigResolver::initialize`] that arrive before
/// the first resolution finishes wait on the same attempt, so the config
/// document is fetched at most once per resolver.
#[derive(Debug)]
pub struct ConfigResolver {
    sources: ConfigSources,
    http: reqwest::Client,
    resolved: OnceCell<Arc<RuntimeConfig>>,
}

impl ConfigResolver {
    pub fn new(sources: ConfigSources) -> Self {
        Self {
            sources,
            http: reqwest::Client::new(),
            resolved: OnceCell::new(),
        }
    }

    /// Resolver whose result is known up front; no source is consulted
    pub fn fixed(api_base_url: impl Into<String>) -> Self {
        let config = RuntimeConfig {
            api_base_url: api_base_url.into(),
            region: Some(DEFAULT_REGION.to_string()),
            resume_bucket: None,
            job_desc_bucket: None,
            environment: None,
            version: None,
            source: ConfigSource::Fixed,
        };
        Self {
            sources: ConfigSources::default(),
            http: reqwest::Client::new(),
            resolved: OnceCell::new_with(Some(Arc::new(config))),
        }
    }

    /// Resolve the runtime configuration, or return the cached result
    ///
    /// Never fails: every source failing degrades to [`FALLBACK_API_URL`].
    pub async fn initialize(&self) -> Arc<RuntimeConfig> {
        self.resolved
            .get_or_init(|| async { Arc::new(self.resolve().await) })
            .await
            .clone()
    }

    /// Resolved configuration, if initialization already completed
    pub fn get(&self) -> Option<Arc<RuntimeConfig>> {
        self.resolved.get().cloned()
    }

    async fn resolve(&self) -> RuntimeConfig {
        let document = match self.sources.config_document_url() {
            Some(url) => self.fetch_document(&url).await,
            None => None,
        };
        let document = document.unwrap_or_default();
        let injected = self.sources.injected.clone().unwrap_or_default();
        let env = &self.sources.env;

        let (api_base_url, source) = if let Some(url) = document.api_endpoint.clone().and_then(non_empty) {
            (url, ConfigSource::Document)
        } else if let Some(url) = injected.api_url.clone().and_then(non_empty) {
            (url, ConfigSource::Injected)
        } else if let Some(url) = env.api_url.clone() {
            (url, ConfigSource::Environment)
        } else {
            tracing::warn!("No API URL configured, using fallback {}", FALLBACK_API_URL);
            (FALLBACK_API_URL.to_string(), ConfigSource::Fallback)
        };

        let pick = |doc: &Option<String>, inj: &Option<String>, env: &Option<String>| {
            doc.clone()
                .and_then(non_empty)
                .or_else(|| inj.clone().and_then(non_empty))
                .or_else(|| env.clone())
        };

        let config = RuntimeConfig {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            region: pick(&document.region, &injected.region, &env.region)
                .or_else(|| Some(DEFAULT_REGION.to_string())),
            resume_bucket: pick(&document.resume_bucket, &injected.resume_bucket, &env.resume_bucket),
            job_desc_bucket: pick(
                &document.job_desc_bucket,
                &injected.job_desc_bucket,
                &env.job_desc_bucket,
            ),
            environment: pick(&document.environment, &injected.environment, &env.environment),
            version: document.version.clone().and_then(non_empty).or_else(|| env.version.clone()),
            source,
        };

        tracing::info!(
            "Runtime configuration resolved: api_base_url={}, source={:?}, environment={:?}",
            config.api_base_url,
            config.source,
            config.environment
        );
        config
    }

    /// Fetch the config document, retrying transient failures
    ///
    /// Any failure is logged and reported as `None` so resolution falls
    /// through to the next source.
    async fn fetch_document(&self, url: &Url) -> Option<ConfigDocument> {
        let attempts = self.sources.fetch_retries + 1;

        for attempt in 1..=attempts {
            match self.fetch_document_once(url).await {
                Ok(document) => return Some(document),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "Config document fetch attempt {}/{} failed: {}, retrying",
                        attempt,
                        attempts,
                        e
                    );
                    tokio::time::sleep(self.sources.retry_delay * attempt).await;
                }
                Err(e) => {
                    tracing::warn!("Config document unavailable at {}: {}", url, e);
                    return None;
                }
            }
        }
        None
    }

    async fn fetch_document_once(&self, url: &Url) -> Result<ConfigDocument, ApiError> {
        tracing::debug!("Fetching config document from: {}", url);

        let response = self
            .http
            .get(url.clone())
            .timeout(self.sources.fetch_timeout)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let text = response.text().await.map_err(ApiError::from)?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Schema(format!("Invalid config document: {}", e)))
    }
}
