//! Staleness classification for stored entities.

use chrono::{DateTime, Duration, Utc};

use super::traits::Cacheable;

/// Default seconds before a stored entity should be refreshed (one day).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
  Absent,
  Fresh,
  Stale,
}

#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
  refresh_interval: Duration,
}

impl Default for FreshnessPolicy {
  fn default() -> Self {
    Self::new(Duration::seconds(DEFAULT_REFRESH_INTERVAL_SECS as i64))
  }
}

impl FreshnessPolicy {
  pub fn new(refresh_interval: Duration) -> Self {
    Self { refresh_interval }
  }

  /// Classify a stored entity relative to `now`.
  ///
  /// An entity exactly `refresh_interval` old is still fresh. Entities stamped
  /// in the future (clock skew) are fresh too.
  pub fn classify<T: Cacheable>(&self, entity: Option<&T>, now: DateTime<Utc>) -> Freshness {
    match entity {
      None => Freshness::Absent,
      Some(entity) if now - entity.fetched_at() <= self.refresh_interval => Freshness::Fresh,
      Some(_) => Freshness::Stale,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::{Deserialize, Serialize};

  #[derive(Debug, Clone, Serialize, Deserialize)]
  struct Stamp(DateTime<Utc>);

  impl Cacheable for Stamp {
    fn cache_key(&self) -> String {
      "stamp".to_string()
    }

    fn fetched_at(&self) -> DateTime<Utc> {
      self.0
    }

    fn entity_type() -> &'static str {
      "stamp"
    }
  }

  #[test]
  fn test_absent_when_nothing_stored() {
    let policy = FreshnessPolicy::default();
    assert_eq!(policy.classify::<Stamp>(None, Utc::now()), Freshness::Absent);
  }

  #[test]
  fn test_boundary_is_fresh() {
    let policy = FreshnessPolicy::default();
    let now = Utc::now();

    let at_boundary = Stamp(now - Duration::seconds(86400));
    assert_eq!(policy.classify(Some(&at_boundary), now), Freshness::Fresh);

    let past_boundary = Stamp(now - Duration::seconds(86401));
    assert_eq!(policy.classify(Some(&past_boundary), now), Freshness::Stale);
  }

  #[test]
  fn test_future_stamp_is_fresh() {
    let policy = FreshnessPolicy::new(Duration::seconds(10));
    let now = Utc::now();
    let skewed = Stamp(now + Duration::minutes(5));
    assert_eq!(policy.classify(Some(&skewed), now), Freshness::Fresh);
  }

  #[test]
  fn test_custom_interval() {
    let policy = FreshnessPolicy::new(Duration::seconds(60));
    let now = Utc::now();
    assert_eq!(
      policy.classify(Some(&Stamp(now - Duration::seconds(61))), now),
      Freshness::Stale
    );
    assert_eq!(
      policy.classify(Some(&Stamp(now - Duration::seconds(59))), now),
      Freshness::Fresh
    );
  }
}
