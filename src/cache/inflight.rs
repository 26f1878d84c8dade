//! Per-key singleflight registry for upstream fetches.
//!
//! Concurrent callers asking for the same key share one spawned fetch task.
//! The task is detached from every caller, so a caller going away (request
//! cancelled, background refresh not awaited) never aborts a fetch others are
//! waiting on.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::CacheError;

/// Handle to a pending fetch. Cloneable; every clone resolves to the same outcome.
pub type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, CacheError>>>;

type Pending<T> = Arc<Mutex<HashMap<String, SharedFetch<T>>>>;

pub struct InFlight<T> {
  pending: Pending<T>,
}

impl<T> Default for InFlight<T> {
  fn default() -> Self {
    Self {
      pending: Arc::new(Mutex::new(HashMap::new())),
    }
  }
}

/// Whether a call to [`InFlight::join_or_start`] started a new fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
  Started,
  Joined,
}

impl<T> InFlight<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Return the pending fetch for `key`, or spawn `start()` and register it.
  ///
  /// Lookup and registration happen under one lock, so two callers can never
  /// both start a fetch for the same key. The entry is removed when the spawned
  /// task finishes, whatever the outcome.
  pub fn join_or_start<F, Fut>(&self, key: &str, start: F) -> (SharedFetch<T>, Claim)
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
  {
    let mut pending = lock(&self.pending);
    if let Some(existing) = pending.get(key) {
      return (existing.clone(), Claim::Joined);
    }

    let guard = Deregister {
      pending: Arc::clone(&self.pending),
      key: key.to_string(),
    };
    let fetch = start();
    let task = tokio::spawn(async move {
      let _guard = guard;
      fetch.await
    });

    let shared = task
      .map(|joined| joined.unwrap_or_else(|e| Err(CacheError::Internal(e.to_string()))))
      .boxed()
      .shared();
    pending.insert(key.to_string(), shared.clone());

    (shared, Claim::Started)
  }

  /// Number of keys with a fetch currently running.
  pub fn pending_count(&self) -> usize {
    lock(&self.pending).len()
  }
}

/// Removes the registry entry when the fetch task ends, including on panic.
///
/// The task cannot deregister before `join_or_start` has inserted the entry:
/// the insert happens while the registry lock is still held.
struct Deregister<T> {
  pending: Pending<T>,
  key: String,
}

impl<T> Drop for Deregister<T> {
  fn drop(&mut self) {
    lock(&self.pending).remove(&self.key);
  }
}

// A poisoned lock still guards a consistent map: every critical section here
// is a single lookup, insert or remove.
fn lock<T>(pending: &Pending<T>) -> MutexGuard<'_, HashMap<String, SharedFetch<T>>> {
  pending.lock().unwrap_or_else(PoisonError::into_inner)
}
