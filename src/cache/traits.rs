//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;

use super::error::CacheError;

/// Trait for entities that can be cached.
///
/// Implementors provide a unique cache key and the time they were fetched
/// from upstream, which drives both staleness and the monotonic upsert.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier for this entity (e.g., spell id)
  fn cache_key(&self) -> String;

  /// When the upstream fetch that produced this entity completed.
  fn fetched_at(&self) -> DateTime<Utc>;

  /// Entity type name for storage organization (e.g., "spell")
  fn entity_type() -> &'static str;
}

/// Source of truth the cache falls through to.
///
/// A fetch is one atomic logical operation: implementations that need several
/// upstream calls must either return a complete entity or an error, never a
/// mix of old and new fields.
pub trait Upstream<T>: Send + Sync + 'static {
  fn fetch(&self, key: &str) -> impl Future<Output = Result<T, CacheError>> + Send;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from data fetched on a cold miss.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from stored data.
  pub fn from_cache(data: T, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::Stale
      } else {
        CacheSource::Fresh
      },
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from upstream because nothing was stored
  Network,
  /// Stored and within the refresh interval
  Fresh,
  /// Stored but past the refresh interval; a background refresh was started
  Stale,
}

impl CacheSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Network => "miss",
      Self::Fresh => "fresh",
      Self::Stale => "stale",
    }
  }
}
