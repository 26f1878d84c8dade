use axum::{
  extract::{Path, Query, State},
  http::HeaderName,
  response::{IntoResponse, Response},
  Json,
};
use serde::Deserialize;
use tracing::warn;

use super::{ApiError, AppState};
use crate::cache::{CacheStorage, Upstream};
use crate::spell::present::present;
use crate::spell::types::SpellMetadata;

/// Tells the caller whether the body came from storage or upstream.
const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

#[derive(Debug, Deserialize)]
pub struct SpellQuery {
  locale: Option<String>,
}

/// `GET /i/spell/{id}?locale=xx_YY`
pub async fn get_spell<S, U>(
  State(state): State<AppState<S, U>>,
  Path(id): Path<String>,
  Query(query): Query<SpellQuery>,
) -> Result<Response, ApiError>
where
  S: CacheStorage,
  U: Upstream<SpellMetadata>,
{
  // Canonical decimal form, so "0123" and "123" share one cache entry
  let id: u64 = id.parse().map_err(|_| ApiError::NotFound)?;
  let key = id.to_string();

  let result = match state.cache.get(&key).await {
    Ok(Some(result)) => result,
    Ok(None) => return Err(ApiError::NotFound),
    Err(e) => {
      warn!(spell = id, error = %e, "error fetching spell");
      return Err(e.into());
    }
  };

  let locale = query.locale.as_deref().filter(|l| !l.is_empty());
  let view = present(&result.data, locale, &state.default_locale)?;

  Ok(([(X_CACHE, result.source.as_str())], Json(view)).into_response())
}

pub async fn health() -> &'static str {
  "ok"
}
