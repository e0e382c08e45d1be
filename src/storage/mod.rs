//! Persisted client state.
//!
//! Stores write named string blobs through a [`Persistence`] adapter. The
//! bearer token lives in the same backend under its own key.

use crate::errors::ApiResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Blob holding the property collections
pub const PROPERTY_STATE_KEY: &str = "property-storage";
/// Blob holding the session record
pub const SESSION_STATE_KEY: &str = "auth-storage";
/// The bearer credential
pub const TOKEN_KEY: &str = "token";

/// Key/value storage for persisted blobs
pub trait Persistence: Send + Sync {
    fn load(&self, key: &str) -> ApiResult<Option<String>>;

    fn store(&self, key: &str, value: &str) -> ApiResult<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> ApiResult<()>;
}

/// Process-local storage, used by tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> ApiResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ApiResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a state directory
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    /// The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Persistence for FilePersistence {
    fn load(&self, key: &str) -> ApiResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, value: &str) -> ApiResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // write-then-rename so a crash never leaves a half-written blob
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Persisted {} ({} bytes)", path.display(), value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> ApiResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The single persisted credential, stored as a JSON string.
/// Its presence is what "logged in" means.
#[derive(Clone)]
pub struct TokenStore {
    persistence: Arc<dyn Persistence>,
}

impl TokenStore {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    pub fn get(&self) -> Option<String> {
        match self.persistence.load(TOKEN_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<String>(&raw) {
                Ok(token) if token.trim().is_empty() => None,
                Ok(token) => Some(token.trim().to_string()),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable stored token: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Could not read stored token: {}", e);
                None
            }
        }
    }

    pub fn set(&self, token: &str) -> ApiResult<()> {
        let encoded = serde_json::to_string(token)?;
        self.persistence.store(TOKEN_KEY, &encoded)
    }

    pub fn clear(&self) {
        if let Err(e) = self.persistence.remove(TOKEN_KEY) {
            tracing::warn!("Could not remove stored token: {}", e);
        }
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}
