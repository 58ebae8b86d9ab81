//! Key/value persistence behind a small trait so the overlay engine can run against
//! `localStorage` in the browser and an in-memory map in tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub(crate) const TOKEN_KEY: &str = "gov_site_token";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage is not available")]
    Unavailable,
    #[error("storage quota exceeded while writing {key}")]
    Quota { key: String },
    #[error("failed to serialize value for {key}: {message}")]
    Serialize { key: String, message: String },
}

pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// `window.localStorage`. Looked up on every call so the handle stays `Send + Sync`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorage;

impl LocalStorage {
    fn handle() -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or(StorageError::Unavailable)
    }
}

impl Storage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::handle()?
            .get_item(key)
            .map_err(|_| StorageError::Unavailable)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // setItem only throws on QuotaExceededError (or in locked-down private modes).
        Self::handle()?
            .set_item(key, value)
            .map_err(|_| StorageError::Quota {
                key: key.to_string(),
            })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        Self::handle()?
            .remove_item(key)
            .map_err(|_| StorageError::Unavailable)
    }
}

/// In-memory storage. Clones share the same map, like two handles to one `localStorage`.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<BTreeMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once the total stored size would exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: Arc::default(),
            quota_bytes: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.items.lock().map_err(|_| StorageError::Unavailable)?;
        Ok(map.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.items.lock().map_err(|_| StorageError::Unavailable)?;
        if let Some(quota) = self.quota_bytes {
            let others: usize = map
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(StorageError::Quota {
                    key: key.to_string(),
                });
            }
        }
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.items.lock().map_err(|_| StorageError::Unavailable)?;
        map.remove(key);
        Ok(())
    }
}

/// Read and parse a JSON value. Missing keys, unavailable storage and malformed JSON all read as
/// `None`.
pub(crate) fn load_json<S: Storage, T: for<'de> Deserialize<'de>>(
    storage: &S,
    key: &str,
) -> Option<T> {
    let json = match storage.get_item(key) {
        Ok(Some(json)) => json,
        Ok(None) => return None,
        Err(e) => {
            log::debug!("read of {key} failed: {e}");
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("ignoring malformed JSON under {key}: {e}");
            None
        }
    }
}

pub(crate) fn save_json<S: Storage, T: Serialize>(
    storage: &S,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let json = serde_json::to_string(value).map_err(|e| StorageError::Serialize {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    storage.set_item(key, &json)
}

pub(crate) fn load_token<S: Storage>(storage: &S) -> Option<String> {
    storage
        .get_item(TOKEN_KEY)
        .ok()
        .flatten()
        .filter(|t| !t.trim().is_empty())
}

pub(crate) fn save_token<S: Storage>(storage: &S, token: Option<&str>) {
    let res = match token {
        Some(t) => storage.set_item(TOKEN_KEY, t),
        None => storage.remove_item(TOKEN_KEY),
    };
    if let Err(e) = res {
        log::warn!("could not persist auth token: {e}");
    }
}
