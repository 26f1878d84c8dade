//! Serde-deserializable types matching Battle.net game data responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::types::SpellMetadata;
use crate::cache::CacheError;

// ============================================================================
// OAuth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiToken {
  pub access_token: String,
  /// Lifetime in seconds
  pub expires_in: u64,
}

// ============================================================================
// Spell endpoints
// ============================================================================

/// `GET /data/wow/spell/{id}` without a `locale` parameter.
#[derive(Debug, Deserialize)]
pub struct ApiSpell {
  pub id: u64,
  /// Locale code to name; locales without a translation come back as null
  #[serde(default)]
  pub name: BTreeMap<String, Option<String>>,
}

/// `GET /data/wow/media/spell/{id}`
#[derive(Debug, Deserialize)]
pub struct ApiSpellMedia {
  #[serde(default)]
  pub assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAsset {
  pub key: String,
  pub value: String,
}

impl ApiSpellMedia {
  pub fn icon(&self) -> Option<&str> {
    self
      .assets
      .iter()
      .find(|asset| asset.key == "icon")
      .map(|asset| asset.value.as_str())
  }
}

impl ApiSpell {
  /// Combine the spell and its media into one record.
  ///
  /// Either half being unusable fails the whole record.
  pub fn into_metadata(
    self,
    media: &ApiSpellMedia,
    fetched_at: DateTime<Utc>,
  ) -> Result<SpellMetadata, CacheError> {
    let display_names: BTreeMap<String, String> = self
      .name
      .into_iter()
      .filter_map(|(locale, name)| name.filter(|n| !n.is_empty()).map(|n| (locale, n)))
      .collect();

    if display_names.is_empty() {
      return Err(CacheError::transient(format!(
        "spell {} has no localized name",
        self.id
      )));
    }

    let icon = media
      .icon()
      .ok_or_else(|| CacheError::transient(format!("spell {} has no icon asset", self.id)))?;

    Ok(SpellMetadata {
      id: self.id,
      display_names,
      icon: icon.to_string(),
      fetched_at,
    })
  }
}
