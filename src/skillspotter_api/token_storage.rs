use crate::storage::{
    EncryptedFilesystemStorage, KeyringStorage, MemoryStorage, StorageBackend, StorageError,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Key under which the session credential is stored
pub const TOKEN_STORAGE_KEY: &str = "skillspotter/token.json";

/// Setting this variable (to any value) skips the OS keychain probe
pub const DISABLE_KEYRING_ENV: &str = "SKILLSPOTTER_DISABLE_KEYRING";

/// Keyring service name used for the credential entry
const KEYRING_SERVICE: &str = "skillspotter";

/// Persisted bearer credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Opaque bearer token issued by the backend
    pub token: String,
    /// When this credential was stored (RFC 3339)
    pub issued_at: String,
}

impl StoredCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Pick the most secure storage backend available on this host
///
/// 1. **Keyring** (OS keychain) unless `SKILLSPOTTER_DISABLE_KEYRING` is set
///    or the keychain cannot be reached
/// 2. **Encrypted filesystem** at `~/.skillspotter/<instance_id>`
///
/// # Arguments
///
/// * `instance_id` - Unique identifier for this application instance (e.g., "dashboard", "skillspotter-cli")
pub async fn select_storage_backend(
    instance_id: &str,
) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let keyring_disabled = std::env::var(DISABLE_KEYRING_ENV).is_ok();

    let keyring_works = if keyring_disabled {
        tracing::debug!("Keyring disabled via {} environment variable", DISABLE_KEYRING_ENV);
        false
    } else {
        // The probe may block on D-Bus, keep it off the async workers
        let probe = tokio::task::spawn_blocking(|| {
            keyring::Entry::new(KEYRING_SERVICE, TOKEN_STORAGE_KEY)
                .and_then(|entry| match entry.get_password() {
                    Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
                    Err(e) => Err(e),
                })
        })
        .await;

        match probe {
            Ok(Ok(())) => {
                tracing::debug!("Keyring storage is available, using OS keychain for the credential");
                true
            }
            Ok(Err(e)) => {
                tracing::debug!("Keyring storage is unavailable ({}), falling back to encrypted filesystem", e);
                false
            }
            Err(e) => {
                tracing::debug!("Keyring probe task failed ({}), falling back to encrypted filesystem", e);
                false
            }
        }
    };

    if keyring_works {
        return Ok(Arc::new(KeyringStorage::new(KEYRING_SERVICE)));
    }

    tracing::debug!("Using encrypted filesystem storage at ~/.skillspotter/{}", instance_id);
    let encrypted = EncryptedFilesystemStorage::new_with_instance(instance_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to initialize encrypted storage: {}", e);
            e
        })?;
    Ok(Arc::new(encrypted))
}

/// Durable home of the session credential
///
/// Writes go to the backend first and only then to the in-memory copy, so
/// the cached value never claims a credential that failed to persist.
/// Cloning shares both the backend and the cache.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
    cached: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("backend", &self.backend.name())
            .field("has_token", &self.current().is_some())
            .finish()
    }
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Credential store with nothing persisted beyond the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Token currently held in memory
    pub fn current(&self) -> Option<String> {
        self.cached
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether a token is currently held
    pub fn is_present(&self) -> bool {
        self.current().is_some()
    }

    /// Read the persisted credential into memory
    ///
    /// Returns `Ok(None)` when nothing is stored. An unreadable record is
    /// reported as an error and leaves the in-memory copy empty.
    pub async fn load(&self) -> Result<Option<String>, StorageError> {
        tracing::debug!("Loading session credential from {} storage", self.backend.name());

        if !self.backend.exists(TOKEN_STORAGE_KEY) {
            tracing::debug!("No stored session credential");
            self.set_cached(None);
            return Ok(None);
        }

        let json = match self.backend.read(TOKEN_STORAGE_KEY).await {
            Ok(json) => json,
            Err(StorageError::NotFound(_)) => {
                self.set_cached(None);
                return Ok(None);
            }
            Err(e) => {
                self.set_cached(None);
                return Err(e);
            }
        };

        let credential: StoredCredential = serde_json::from_slice(&json).map_err(|e| {
            tracing::error!("Failed to deserialize stored credential: {}", e);
            self.set_cached(None);
            StorageError::Config(format!("JSON deserialization failed: {}", e))
        })?;

        tracing::debug!("Session credential loaded (issued_at={})", credential.issued_at);
        self.set_cached(Some(credential.token.clone()));
        Ok(Some(credential.token))
    }

    /// Persist `token` and make it the current credential
    pub async fn save(&self, token: &str) -> Result<(), StorageError> {
        let credential = StoredCredential::new(token);
        let json = serde_json::to_vec(&credential).map_err(|e| {
            tracing::error!("Failed to serialize credential: {}", e);
            StorageError::Config(format!("JSON serialization failed: {}", e))
        })?;

        self.backend.write(TOKEN_STORAGE_KEY, &json).await?;
        self.set_cached(Some(credential.token));

        tracing::debug!("Session credential saved to {} storage", self.backend.name());
        Ok(())
    }

    /// Forget the credential
    ///
    /// The in-memory copy is always dropped, even when removing the
    /// persisted record fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.set_cached(None);

        if !self.backend.exists(TOKEN_STORAGE_KEY) {
            return Ok(());
        }

        match self.backend.remove(TOKEN_STORAGE_KEY).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {
                tracing::debug!("Session credential cleared");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to remove stored credential: {}", e);
                Err(e)
            }
        }
    }

    /// Read the persisted token without touching the in-memory copy
    pub async fn peek_persisted(&self) -> Result<Option<String>, StorageError> {
        if !self.backend.exists(TOKEN_STORAGE_KEY) {
            return Ok(None);
        }
        let json = self.backend.read(TOKEN_STORAGE_KEY).await?;
        let credential: StoredCredential = serde_json::from_slice(&json)
            .map_err(|e| StorageError::Config(format!("JSON deserialization failed: {}", e)))?;
        Ok(Some(credential.token))
    }

    fn set_cached(&self, token: Option<String>) {
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = token;
    }
}
