//! Two-tier response cache.
//!
//! `MemoryCache` is the fast path: a short-lived map keyed by request path.
//! `PersistentCache` writes every successful response to a `KeyValueStore`
//! and is only read back when a live fetch fails. Both tiers expire lazily
//! at read time; nothing is ever swept.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::KeyValueStore;

/// Memory tier lifetime.
pub const MEMORY_TTL: Duration = Duration::from_secs(5 * 60);
/// Persistent tier lifetime.
pub const PERSISTENT_TTL: Duration = Duration::from_secs(60 * 60);
/// Key prefix for persisted responses.
pub const DEFAULT_KEY_PREFIX: &str = "weather_cache:";

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// A response held in the memory tier.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub stored_at_ms: i64,
    pub payload: Value,
    pub fetched_at_label: String,
}

/// In-process cache keyed by request path.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl_ms: i64,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MEMORY_TTL)
    }
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: ttl_millis(ttl),
        }
    }

    /// Return the entry for `key` if it is younger than the TTL at `now_ms`.
    pub fn get(&self, key: &str, now_ms: i64) -> Option<CacheEntry> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if now_ms.saturating_sub(entry.stored_at_ms) < self.ttl_ms {
            Some(entry.clone())
        } else {
            None
        }
    }

    pub fn set(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().insert(key.to_string(), entry);
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A response as written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    pub saved_at: i64,
    pub data: Value,
}

/// Fallback tier backed by a `KeyValueStore`.
#[derive(Clone)]
pub struct PersistentCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl_ms: i64,
}

impl std::fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache")
            .field("prefix", &self.prefix)
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

impl PersistentCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_settings(store, DEFAULT_KEY_PREFIX, PERSISTENT_TTL)
    }

    pub fn with_settings(
        store: Arc<dyn KeyValueStore>,
        prefix: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ttl_ms: ttl_millis(ttl),
        }
    }

    fn key(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }

    /// Persist `data` for `path`. Failures are logged and swallowed.
    pub fn save(&self, path: &str, data: &Value, saved_at_ms: i64) {
        let entry = PersistedEntry {
            saved_at: saved_at_ms,
            data: data.clone(),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry for {}: {}", path, e);
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key(path), &raw) {
            tracing::warn!("Persistent cache save failed for {}: {}", path, e);
        }
    }

    /// Load the entry for `path` unless it is missing, unreadable, or older
    /// than the TTL at `now_ms`.
    pub fn load(&self, path: &str, now_ms: i64) -> Option<PersistedEntry> {
        let raw = match self.store.get(&self.key(path)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Persistent cache read failed for {}: {}", path, e);
                return None;
            }
        };

        let entry: PersistedEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Ignoring unreadable cache entry for {}: {}", path, e);
                return None;
            }
        };

        if now_ms.saturating_sub(entry.saved_at) > self.ttl_ms {
            tracing::debug!("Persisted entry for {} has expired", path);
            return None;
        }

        Some(entry)
    }
}
