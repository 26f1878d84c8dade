//! Test doubles shared across module tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::cache::{CacheError, Upstream};

type Respond<T> = Box<dyn Fn(&str, usize) -> Result<T, CacheError> + Send + Sync>;

/// Upstream that answers from a closure and counts calls.
///
/// The closure receives the key and the 1-based call number. The call is
/// counted as soon as the fetch starts, before any delay.
pub struct StubUpstream<T> {
  respond: Respond<T>,
  calls: AtomicUsize,
  delay: Duration,
}

impl<T> StubUpstream<T> {
  pub fn new(respond: impl Fn(&str, usize) -> Result<T, CacheError> + Send + Sync + 'static) -> Self {
    Self {
      respond: Box::new(respond),
      calls: AtomicUsize::new(0),
      delay: Duration::ZERO,
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl<T: Send + 'static> Upstream<T> for StubUpstream<T> {
  async fn fetch(&self, key: &str) -> Result<T, CacheError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    (self.respond)(key, call)
  }
}
