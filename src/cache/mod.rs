//! Generic read-through caching layer.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Persists entities keyed by `cache_key` in a record store
//! - Classifies stored entities as fresh or stale by their fetch time
//! - Fetches cold misses synchronously and refreshes stale hits in the background
//! - Shares one upstream fetch between concurrent lookups of the same key

mod error;
mod freshness;
mod inflight;
mod layer;
mod storage;
mod traits;

pub use error::CacheError;
pub use freshness::DEFAULT_REFRESH_INTERVAL_SECS;
pub use layer::CacheLayer;
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{Cacheable, Upstream};
