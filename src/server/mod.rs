//! Inbound HTTP surface.

mod error;
mod routes;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::{CacheLayer, CacheStorage, Upstream};
use crate::config::Locale;
use crate::spell::types::SpellMetadata;

pub use error::ApiError;

pub type SpellCache<S, U> = CacheLayer<SpellMetadata, S, U>;

pub struct AppState<S, U> {
  pub cache: Arc<SpellCache<S, U>>,
  pub default_locale: Locale,
}

impl<S, U> AppState<S, U> {
  pub fn new(cache: SpellCache<S, U>, default_locale: Locale) -> Self {
    Self {
      cache: Arc::new(cache),
      default_locale,
    }
  }
}

impl<S, U> Clone for AppState<S, U> {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
      default_locale: self.default_locale.clone(),
    }
  }
}

pub fn router<S, U>(state: AppState<S, U>) -> Router
where
  S: CacheStorage,
  U: Upstream<SpellMetadata>,
{
  Router::new()
    .route("/i/spell/:id", get(routes::get_spell::<S, U>))
    .route("/health", get(routes::health))
    .layer(CorsLayer::new().allow_origin(Any))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
