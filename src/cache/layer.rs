//! Response cache that sits in front of live search requests.

use chrono::Duration;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;

use super::storage::CacheStorage;
use super::traits::{CacheEntry, CacheResult, Clock, SystemClock};
use crate::error::{MetricsError, MetricsResult};

/// Default time-to-live for a cached response, in minutes.
pub const DEFAULT_TTL_MINUTES: i64 = 60;

/// Time-bounded cache keyed by request fingerprint.
///
/// One instance is built at startup and shared (it is cheap to clone) with
/// every client that issues search requests.
pub struct ResponseCache<S: CacheStorage> {
  storage: Arc<S>,
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl<S: CacheStorage> ResponseCache<S> {
  /// Create a new cache with the given storage backend and a one hour TTL.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Return the cached value for `key`, or run `fetcher` and cache its result.
  ///
  /// 1. Unexpired entry: returned as is, `fetcher` is not called
  /// 2. Expired entry: removed, then treated as a miss
  /// 3. Miss: `fetcher` runs; only a successful result is written back
  pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, fetcher: F) -> MetricsResult<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = MetricsResult<T>>,
  {
    if let Some(bytes) = self.storage.get(key).map_err(cache_error)? {
      match serde_json::from_slice::<CacheEntry<T>>(&bytes) {
        Ok(entry) if entry.is_fresh(self.clock.now()) => {
          tracing::trace!(key, "cache hit");
          return Ok(CacheResult::from_cache(entry.value));
        }
        Ok(_) => tracing::debug!(key, "cache entry expired"),
        Err(e) => tracing::debug!(key, error = %e, "discarding unreadable cache entry"),
      }
      self.storage.remove(key).map_err(cache_error)?;
    }

    let data = fetcher().await?;

    let entry = CacheEntry {
      value: &data,
      expiry: self.clock.now() + self.ttl,
    };
    let bytes = serde_json::to_vec(&entry)?;
    self.storage.set(key, &bytes).map_err(cache_error)?;
    tracing::trace!(key, "cache miss, stored live response");

    Ok(CacheResult::from_network(data))
  }

  /// Drop every entry, fresh or not.
  pub fn clear(&self) -> MetricsResult<()> {
    self.storage.clear().map_err(cache_error)
  }
}

impl<S: CacheStorage> Clone for ResponseCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl: self.ttl,
      clock: Arc::clone(&self.clock),
    }
  }
}

fn cache_error(e: color_eyre::Report) -> MetricsError {
  MetricsError::Cache(e.to_string())
}
