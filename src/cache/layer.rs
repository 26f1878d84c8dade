//! Cache layer that orchestrates caching logic with upstream fetching.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::CacheError;
use super::freshness::{Freshness, FreshnessPolicy};
use super::inflight::{Claim, InFlight, SharedFetch};
use super::storage::{CacheStorage, Upsert};
use super::traits::{CacheResult, Cacheable, Upstream};

/// Read-through cache over a record store and an upstream source.
///
/// Fresh entities are served from storage. Stale entities are served from
/// storage while a background refresh runs. Missing entities are fetched
/// synchronously. At most one upstream fetch per key runs at a time.
pub struct CacheLayer<T, S, U> {
  storage: Arc<S>,
  upstream: Arc<U>,
  policy: FreshnessPolicy,
  inflight: InFlight<T>,
}

impl<T, S, U> CacheLayer<T, S, U>
where
  T: Cacheable,
  S: CacheStorage,
  U: Upstream<T>,
{
  /// Create a new cache layer with the given storage backend and upstream.
  pub fn new(storage: S, upstream: U) -> Self {
    Self {
      storage: Arc::new(storage),
      upstream: Arc::new(upstream),
      policy: FreshnessPolicy::default(),
      inflight: InFlight::new(),
    }
  }

  /// Set how long stored data stays fresh.
  pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
    self.policy = FreshnessPolicy::new(refresh_interval);
    self
  }

  #[cfg(test)]
  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Look up `key`.
  ///
  /// Returns `Ok(None)` when upstream reports the key does not exist. Nothing
  /// is cached for that outcome, so the next lookup asks upstream again.
  pub async fn get(&self, key: &str) -> Result<Option<CacheResult<T>>, CacheError> {
    let cached = self
      .storage
      .get_entity::<T>(key)
      .map_err(CacheError::storage)?;

    match self.policy.classify(cached.as_ref(), Utc::now()) {
      Freshness::Fresh => Ok(cached.map(|entity| CacheResult::from_cache(entity, false))),
      Freshness::Stale => {
        self.refresh_in_background(key);
        Ok(cached.map(|entity| CacheResult::from_cache(entity, true)))
      }
      Freshness::Absent => Ok(
        self
          .fetch_and_store(key)
          .await?
          .map(CacheResult::from_network),
      ),
    }
  }

  /// Fetch `key` from upstream and store it, joining a fetch already running.
  ///
  /// `Ok(None)` means upstream does not know the key.
  async fn fetch_and_store(&self, key: &str) -> Result<Option<T>, CacheError> {
    match self.start_fetch(key).await {
      Ok(entity) => Ok(Some(entity)),
      Err(CacheError::NotFound) => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Start (or join) a refresh of `key` without waiting for it.
  ///
  /// The outcome only reaches callers through storage. Failures leave the
  /// stored entity as it was.
  fn refresh_in_background(&self, key: &str) {
    let fetch = self.start_fetch(key);
    let key = key.to_string();

    tokio::spawn(async move {
      match fetch.await {
        Ok(_) => debug!(entity = T::entity_type(), key = %key, "background refresh stored"),
        Err(CacheError::NotFound) => info!(
          entity = T::entity_type(),
          key = %key,
          "gone upstream during refresh, keeping stale entry"
        ),
        Err(e) => warn!(
          entity = T::entity_type(),
          key = %key,
          error = %e,
          "background refresh failed"
        ),
      }
    });
  }

  fn start_fetch(&self, key: &str) -> SharedFetch<T> {
    let storage = Arc::clone(&self.storage);
    let upstream = Arc::clone(&self.upstream);
    let policy = self.policy;
    let owned_key = key.to_string();

    let (fetch, claim) = self.inflight.join_or_start(key, move || async move {
      // A fetch that finished between our read and this claim already stored
      // a fresh entity
      let current = storage
        .get_entity::<T>(&owned_key)
        .map_err(CacheError::storage)?;
      if policy.classify(current.as_ref(), Utc::now()) == Freshness::Fresh {
        if let Some(entity) = current {
          return Ok(entity);
        }
      }

      let entity = upstream.fetch(&owned_key).await?;
      store(storage.as_ref(), &owned_key, entity)
    });

    match claim {
      Claim::Started => debug!(
        entity = T::entity_type(),
        key,
        in_flight = self.inflight.pending_count(),
        "fetching from upstream"
      ),
      Claim::Joined => debug!(entity = T::entity_type(), key, "joined in-flight fetch"),
    }

    fetch
  }
}

/// Upsert a freshly fetched entity, returning whichever entity storage now holds.
fn store<T: Cacheable, S: CacheStorage>(storage: &S, key: &str, entity: T) -> Result<T, CacheError> {
  match storage.upsert_entity(&entity).map_err(CacheError::storage)? {
    Upsert::Written => Ok(entity),
    Upsert::Superseded => {
      debug!(entity = T::entity_type(), key, "newer entry already stored, discarding fetch");
      Ok(storage
        .get_entity::<T>(key)
        .map_err(CacheError::storage)?
        .unwrap_or(entity))
    }
  }
}
