use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::types::RecognitionResult;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("Cached entry '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

/// Key-value store for finished recognitions, keyed by the content digest
/// of the input bytes. Callers treat every error as a miss.
pub trait RecognitionCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<RecognitionResult>, CacheError>> + Send;

    fn put(
        &self,
        key: &str,
        result: &RecognitionResult,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
}

impl<C: RecognitionCache> RecognitionCache for Arc<C> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<RecognitionResult>, CacheError>> + Send {
        (**self).get(key)
    }

    fn put(
        &self,
        key: &str,
        result: &RecognitionResult,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        (**self).put(key, result, ttl)
    }
}

type Entries = HashMap<String, (RecognitionResult, Option<Instant>)>;

/// Expiring in-process map. An entry whose expiry does not fit in an
/// `Instant` never expires.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

fn is_live(expires: Option<Instant>, now: Instant) -> bool {
    expires.map_or(true, |e| e > now)
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Entries>, CacheError> {
        self.entries.lock().map_err(|_| CacheError::Unavailable("memory cache lock poisoned".into()))
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().map_or(0, |m| m.values().filter(|(_, exp)| is_live(*exp, now)).count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        match self.lock() {
            Ok(mut map) => {
                let before = map.len();
                map.retain(|_, (_, expires)| is_live(*expires, now));
                before - map.len()
            }
            Err(_) => 0,
        }
    }
}

impl RecognitionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<RecognitionResult>, CacheError> {
        let mut map = self.lock()?;
        match map.get(key) {
            Some((result, expires)) if is_live(*expires, Instant::now()) => Ok(Some(result.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, result: &RecognitionResult, ttl: Duration) -> Result<(), CacheError> {
        let expires = Instant::now().checked_add(ttl);
        self.lock()?.insert(key.to_string(), (result.clone(), expires));
        Ok(())
    }
}

/// Caching switched off: every lookup misses, every write is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl RecognitionCache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<RecognitionResult>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _result: &RecognitionResult, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_round_trip_and_expiry() {
        let cache = MemoryCache::new();
        let result = RecognitionResult::degraded(0.1);
        assert!(cache.get("ocr:a").await.unwrap().is_none());

        cache.put("ocr:a", &result, Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("ocr:a").await.unwrap(), Some(result.clone()));
        assert_eq!(cache.len(), 1);

        cache.put("ocr:b", &result, Duration::ZERO).await.unwrap();
        assert!(cache.get("ocr:b").await.unwrap().is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn purge_drops_only_expired() {
        let cache = MemoryCache::new();
        let result = RecognitionResult::degraded(0.0);
        cache.put("live", &result, Duration::from_secs(60)).await.unwrap();
        cache.put("stale", &result, Duration::ZERO).await.unwrap();
        assert_eq!(cache.purge_expired(), 1);
        assert!(!cache.is_empty());
    }

    #[tokio::test]
    async fn oversized_ttl_never_expires() {
        let config = crate::config::PipelineConfig::from_toml("cache_ttl_secs = 9223372036854775807").unwrap();
        let cache = MemoryCache::new();
        let result = RecognitionResult::degraded(0.3);

        cache.put("k", &result, config.cache_ttl()).await.unwrap();
        cache.put("max", &result, Duration::MAX).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(result.clone()));
        assert_eq!(cache.get("max").await.unwrap(), Some(result));
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn shared_cache_sees_writes_through_arc() {
        let cache = Arc::new(MemoryCache::new());
        let handle = cache.clone();
        handle.put("k", &RecognitionResult::degraded(0.1), Duration::from_secs(60)).await.unwrap();
        assert!(RecognitionCache::get(&cache, "k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn no_cache_never_hits() {
        let cache = NoCache;
        cache.put("k", &RecognitionResult::degraded(0.0), Duration::from_secs(60)).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }
}
