//! HTTP error responses.
//!
//! Every failure is serialized as `{ "error": ..., "message": ... }`.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use tracing::error;

use crate::cache::CacheError;
use crate::spell::present::PresentError;

#[derive(Debug)]
pub enum ApiError {
  NotFound,
  /// Upstream failed on a cold miss; carries the upstream status when known
  Upstream {
    status: Option<u16>,
    message: String,
  },
  DataIntegrity(String),
  Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
  error: &'static str,
  message: String,
}

impl ApiError {
  fn status_code(&self) -> StatusCode {
    match self {
      Self::NotFound => StatusCode::NOT_FOUND,
      Self::Upstream { status, .. } => status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::BAD_GATEWAY),
      Self::DataIntegrity(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<CacheError> for ApiError {
  fn from(err: CacheError) -> Self {
    match err {
      CacheError::NotFound => Self::NotFound,
      CacheError::Transient { status, message } => Self::Upstream { status, message },
      CacheError::Storage(message) | CacheError::Internal(message) => Self::Internal(message),
    }
  }
}

impl From<PresentError> for ApiError {
  fn from(err: PresentError) -> Self {
    Self::DataIntegrity(err.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    let (error, message) = match self {
      Self::NotFound => ("not found", String::new()),
      Self::Upstream { message, .. } => ("upstream error", message),
      Self::DataIntegrity(message) => {
        error!(%message, "stored record failed integrity check");
        ("data integrity error", message)
      }
      Self::Internal(message) => {
        error!(%message, "internal error");
        ("internal error", message)
      }
    };

    if message.is_empty() {
      return status.into_response();
    }
    (status, Json(ErrorBody { error, message })).into_response()
  }
}
