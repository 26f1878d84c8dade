//! Error taxonomy shared by the cache layer and its upstream clients.

use thiserror::Error;

/// Failure of a cache lookup or of a fetch-and-store.
///
/// `Clone` because one in-flight fetch outcome is handed to every caller
/// that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
  /// The identifier does not exist upstream. Never cached.
  #[error("not found upstream")]
  NotFound,

  /// Upstream unavailable, rate-limited, or returned something unusable.
  #[error("upstream error{}: {message}", status_suffix(.status))]
  Transient {
    status: Option<u16>,
    message: String,
  },

  /// The record store failed to read or write.
  #[error("storage error: {0}")]
  Storage(String),

  /// The fetch task died before producing an outcome.
  #[error("fetch task failed: {0}")]
  Internal(String),
}

impl CacheError {
  pub fn transient(message: impl Into<String>) -> Self {
    Self::Transient {
      status: None,
      message: message.into(),
    }
  }

  pub fn storage(err: impl std::fmt::Display) -> Self {
    Self::Storage(err.to_string())
  }
}

fn status_suffix(status: &Option<u16>) -> String {
  status.map(|s| format!(" ({s})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_transient_display_includes_status() {
    let err = CacheError::Transient {
      status: Some(429),
      message: "slow down".to_string(),
    };
    assert_eq!(err.to_string(), "upstream error (429): slow down");
    assert_eq!(
      CacheError::transient("timed out").to_string(),
      "upstream error: timed out"
    );
  }
}
