//! Keyed query cache with stale-time and prefix invalidation.
//!
//! DESIGN
//! ======
//! Keys are ordered string parts (`["team", "<id>"]`). Values are stored
//! type-erased and downcast on read; a read with the wrong type is a miss.
//! `invalidate(prefix)` drops every key whose leading parts equal the prefix,
//! so invalidating `["my-teams"]` clears every user's `["my-teams", uid]`.
//!
//! TRADE-OFFS
//! ==========
//! Concurrent misses on the same key each fetch; the last write wins.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

pub type CacheKey = Vec<String>;

/// Build a cache key from its parts.
#[must_use]
pub fn key<I, S>(parts: I) -> CacheKey
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    parts.into_iter().map(|p| p.to_string()).collect()
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

pub struct QueryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    stale_after: Duration,
}

impl QueryCache {
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), stale_after }
    }

    /// Fresh cached value for `key`, if any.
    pub async fn get<T>(&self, key: &[String]) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() >= self.stale_after {
            return None;
        }
        Arc::clone(&entry.value).downcast::<T>().ok()
    }

    pub async fn insert<T>(&self, key: CacheKey, value: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let entry = CacheEntry { value, stored_at: Instant::now() };
        self.entries.write().await.insert(key, entry);
    }

    /// Serve a fresh cached value or run `fetch` and cache its result.
    /// Errors are returned as-is and never cached.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns on failure.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(&key).await {
            tracing::trace!(key = ?key, "query cache hit");
            return Ok(hit);
        }
        let value = Arc::new(fetch().await?);
        self.insert(key, Arc::clone(&value)).await;
        Ok(value)
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many went.
    pub async fn invalidate(&self, prefix: &[String]) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        let dropped = before - entries.len();
        if dropped > 0 {
            tracing::debug!(prefix = ?prefix, dropped, "query cache invalidated");
        }
        dropped
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
