//! Locale selection for stored spells.

use serde::Serialize;
use thiserror::Error;

use super::types::SpellMetadata;
use crate::config::Locale;

/// What a caller sees for one spell in one locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpellView {
  pub id: u64,
  pub name: String,
  pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresentError {
  /// The stored record lacks the default locale. Records are validated on
  /// write, so this points at a write-path bug.
  #[error("spell {id} has no name for {requested} or default locale {default}")]
  MissingLocale {
    id: u64,
    requested: String,
    default: String,
  },
}

/// Pick the name for `requested`, falling back to `default`.
pub fn present(
  spell: &SpellMetadata,
  requested: Option<&str>,
  default: &Locale,
) -> Result<SpellView, PresentError> {
  let requested = requested.unwrap_or(&default.0);
  let name = spell
    .display_names
    .get(requested)
    .or_else(|| spell.display_names.get(&default.0))
    .ok_or_else(|| PresentError::MissingLocale {
      id: spell.id,
      requested: requested.to_string(),
      default: default.0.clone(),
    })?;

  Ok(SpellView {
    id: spell.id,
    name: name.clone(),
    icon: spell.icon.clone(),
  })
}
