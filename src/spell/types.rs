use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::Cacheable;

/// Cached metadata for one spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellMetadata {
  pub id: u64,
  /// Localized names keyed by locale code (e.g. "en_US"). Never empty.
  pub display_names: BTreeMap<String, String>,
  /// Icon asset reference as returned by the media endpoint
  pub icon: String,
  pub fetched_at: DateTime<Utc>,
}

impl Cacheable for SpellMetadata {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn fetched_at(&self) -> DateTime<Utc> {
    self.fetched_at
  }

  fn entity_type() -> &'static str {
    "spell"
  }
}
