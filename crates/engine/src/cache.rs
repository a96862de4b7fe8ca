//! Read-through cache with prefix invalidation.
//!
//! Rate lookups and relay-point searches run through [`CacheService`]. The
//! cache is strictly advisory: every caller remains correct when the
//! backing store is absent, failing, or evicting aggressively. Store
//! errors are swallowed here and never reach callers.
//!
//! The production store is an in-process `moka` cache; the [`CacheStore`]
//! trait keeps the backend swappable (and lets tests inject a failing one).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// How many keys a single invalidation scan batch may touch.
const SCAN_BATCH_SIZE: usize = 100;

/// Maximum number of entries the in-process store retains.
const STORE_CAPACITY: u64 = 10_000;

/// Errors raised by a cache backend. Callers of [`CacheService`] never see
/// these; they exist so stores can report unavailability.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A stored value with its per-key expiry.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub value: serde_json::Value,
    pub expires_at: Instant,
}

impl CachedEntry {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Backend storage for [`CacheService`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedEntry>, CacheError>;
    async fn put(&self, key: String, entry: CachedEntry) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Return up to `limit` keys after `cursor` (exclusive), plus the
    /// cursor for the next batch. Must never require scanning the whole
    /// keyspace in one call.
    async fn scan_keys(
        &self,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<(Vec<String>, Option<String>), CacheError>;
}

/// In-process `moka`-backed store.
pub struct MokaStore {
    cache: Cache<String, CachedEntry>,
}

impl MokaStore {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(STORE_CAPACITY)
            // Upper bound only; per-entry TTLs are enforced on read
            .time_to_live(Duration::from_secs(24 * 60 * 60))
            .build();
        Self { cache }
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn get(&self, key: &str) -> Result<Option<CachedEntry>, CacheError> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: String, entry: CachedEntry) -> Result<(), CacheError> {
        self.cache.insert(key, entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn scan_keys(
        &self,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<(Vec<String>, Option<String>), CacheError> {
        // Make recent inserts visible to the iterator
        self.cache.run_pending_tasks().await;

        let mut keys: Vec<String> = self
            .cache
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        keys.sort_unstable();

        let start = cursor.map_or(0, |c| keys.partition_point(|k| *k <= c));
        let batch: Vec<String> = keys.iter().skip(start).take(limit).cloned().collect();
        let next = (start + batch.len() < keys.len())
            .then(|| batch.last().cloned())
            .flatten();

        Ok((batch, next))
    }
}

/// Builder for cache keys: a human-readable prefix plus `:`-separated
/// compound parts. Non-primitive parts are reduced to a short, stable
/// content hash so key length stays bounded regardless of payload size.
#[derive(Debug, Clone)]
pub struct CacheKey {
    buf: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            buf: prefix.to_string(),
        }
    }

    /// Append a primitive part verbatim.
    #[must_use]
    pub fn part(mut self, part: impl std::fmt::Display) -> Self {
        self.buf.push(':');
        self.buf.push_str(&part.to_string());
        self
    }

    /// Append a structured part as a 16-hex-char SHA-256 content hash.
    #[must_use]
    pub fn hashed_part<T: Serialize>(mut self, part: &T) -> Self {
        let json = serde_json::to_string(part).unwrap_or_default();
        let digest = Sha256::digest(json.as_bytes());
        let hex = hex::encode(digest);
        self.buf.push(':');
        self.buf.push_str(hex.get(..16).unwrap_or(&hex));
        self
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.buf)
    }
}

/// Read-through cache facade shared across the engine.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
}

impl CacheService {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Create a service backed by the in-process store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MokaStore::new()))
    }

    /// Read-through lookup.
    ///
    /// Returns the cached value when present and fresh; otherwise computes
    /// via `fetch` and writes the result back best-effort. Store failures
    /// on either side degrade to a direct `fetch` call - the only error a
    /// caller can see is its own fetch error.
    ///
    /// # Errors
    ///
    /// Propagates only errors returned by `fetch`.
    pub async fn cached<T, E, F, Fut>(&self, key: &CacheKey, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.store.get(key.as_str()).await {
            Ok(Some(entry)) if entry.is_fresh() => {
                if let Ok(value) = serde_json::from_value(entry.value) {
                    return Ok(value);
                }
                // Shape changed between releases; treat as a miss
                debug!(key = %key, "discarding cache entry with stale shape");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(key = %key, error = %e, "cache read failed, fetching directly");
                return fetch().await;
            }
        }

        let value = fetch().await?;

        match serde_json::to_value(&value) {
            Ok(json) => {
                let entry = CachedEntry {
                    value: json,
                    expires_at: Instant::now() + ttl,
                };
                if let Err(e) = self.store.put(key.as_str().to_string(), entry).await {
                    debug!(key = %key, error = %e, "cache write failed");
                }
            }
            Err(e) => debug!(key = %key, error = %e, "value not cacheable"),
        }

        Ok(value)
    }

    /// Delete every key starting with `prefix`, scanning in bounded
    /// batches. Returns the number of keys deleted; store failures abort
    /// the scan silently (the cache is advisory).
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut deleted = 0;
        let mut cursor = None;

        loop {
            let (keys, next) = match self.store.scan_keys(cursor, SCAN_BATCH_SIZE).await {
                Ok(batch) => batch,
                Err(e) => {
                    debug!(prefix = %prefix, error = %e, "cache scan failed");
                    return deleted;
                }
            };

            for key in &keys {
                if key.starts_with(prefix) && self.store.delete(key).await.is_ok() {
                    deleted += 1;
                }
            }

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        deleted
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CacheError, CacheStore, CachedEntry};
    use async_trait::async_trait;

    /// A store whose backend is permanently down.
    pub struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<CachedEntry>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn put(&self, _key: String, _entry: CachedEntry) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn scan_keys(
            &self,
            _cursor: Option<String>,
            _limit: usize,
        ) -> Result<(Vec<String>, Option<String>), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }
}
