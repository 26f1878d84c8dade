use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::cache::{CacheError, Upstream};
use crate::config::{BlizzardConfig, Config};
use crate::spell::api_types::{ApiSpell, ApiSpellMedia, ApiToken};
use crate::spell::types::SpellMetadata;

/// Refresh the access token this long before Battle.net says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Battle.net game data API client
pub struct BlizzardClient {
  http: reqwest::Client,
  api_url: Url,
  oauth_url: Url,
  namespace: String,
  client_id: String,
  client_secret: String,
  token: Arc<Mutex<Option<AccessToken>>>,
}

struct AccessToken {
  value: String,
  expires_at: Instant,
}

impl BlizzardClient {
  pub fn new(config: &BlizzardConfig) -> Result<Self> {
    let (client_id, client_secret) = Config::get_client_credentials()?;
    Self::with_credentials(config, client_id, client_secret)
  }

  pub fn with_credentials(
    config: &BlizzardConfig,
    client_id: String,
    client_secret: String,
  ) -> Result<Self> {
    let mut api_url = config.api_url();
    // Url::join drops the last path segment unless the base ends in '/'
    if !api_url.ends_with('/') {
      api_url.push('/');
    }
    let api_url =
      Url::parse(&api_url).map_err(|e| eyre!("Invalid Battle.net API url {}: {}", api_url, e))?;
    let oauth_url = Url::parse(&config.oauth_url)
      .map_err(|e| eyre!("Invalid Battle.net OAuth url {}: {}", config.oauth_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      api_url,
      oauth_url,
      namespace: config.namespace(),
      client_id,
      client_secret,
      token: Arc::new(Mutex::new(None)),
    })
  }

  /// Get a valid access token, requesting a new one if needed.
  ///
  /// The lock is held across the token request so concurrent callers wait
  /// for one request instead of each issuing their own.
  async fn access_token(&self) -> Result<String, CacheError> {
    let mut token = self.token.lock().await;
    if let Some(current) = token.as_ref().filter(|t| t.expires_at > Instant::now()) {
      return Ok(current.value.clone());
    }

    debug!("requesting Battle.net access token");
    let response = self
      .http
      .post(self.oauth_url.clone())
      .basic_auth(&self.client_id, Some(&self.client_secret))
      .form(&[("grant_type", "client_credentials")])
      .send()
      .await
      .map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      // Never NotFound: a broken token endpoint says nothing about the spell
      return Err(CacheError::Transient {
        status: Some(status.as_u16()),
        message: format!("token request failed: {}", body),
      });
    }

    let issued: ApiToken = response
      .json()
      .await
      .map_err(|e| CacheError::transient(format!("malformed token response: {}", e)))?;

    let lifetime = Duration::from_secs(issued.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
    let expires_at = Instant::now()
      .checked_add(lifetime)
      .ok_or_else(|| CacheError::transient("malformed token response: expires_in out of range"))?;
    *token = Some(AccessToken {
      value: issued.access_token.clone(),
      expires_at,
    });

    Ok(issued.access_token)
  }

  /// GET a game data document relative to the API base url.
  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CacheError> {
    let token = self.access_token().await?;
    let url = self
      .api_url
      .join(path)
      .map_err(|e| CacheError::transient(format!("invalid path {}: {}", path, e)))?;

    let response = self
      .http
      .get(url)
      .query(&[("namespace", self.namespace.as_str())])
      .bearer_auth(token)
      .send()
      .await
      .map_err(transport_error)?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
      // Revoked or expired early; make the next call re-authenticate
      self.token.lock().await.take();
    }
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(status_error(status, body));
    }

    response
      .json()
      .await
      .map_err(|e| CacheError::transient(format!("malformed response from {}: {}", path, e)))
  }
}

impl Upstream<SpellMetadata> for BlizzardClient {
  /// Fetch name and icon together. Either request failing fails the fetch.
  async fn fetch(&self, key: &str) -> Result<SpellMetadata, CacheError> {
    let id: u64 = key.parse().map_err(|_| CacheError::NotFound)?;
    debug!(spell = id, "fetching spell from Battle.net");

    let spell_path = format!("data/wow/spell/{}", id);
    let media_path = format!("data/wow/media/spell/{}", id);
    let (spell, media) = tokio::try_join!(
      self.get_json::<ApiSpell>(&spell_path),
      self.get_json::<ApiSpellMedia>(&media_path),
    )?;

    spell.into_metadata(&media, Utc::now())
  }
}

fn status_error(status: StatusCode, body: String) -> CacheError {
  if status == StatusCode::NOT_FOUND {
    return CacheError::NotFound;
  }

  let message = if body.is_empty() {
    status.canonical_reason().unwrap_or("request failed").to_string()
  } else {
    body
  };
  CacheError::Transient {
    status: Some(status.as_u16()),
    message,
  }
}

fn transport_error(e: reqwest::Error) -> CacheError {
  CacheError::Transient {
    status: e.status().map(|s| s.as_u16()),
    message: e.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    extract::{Path, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
  };
  use serde_json::json;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Serve `router` on an ephemeral port and return its base url.
  async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{}", addr)
  }

  fn authorized(headers: &HeaderMap, query: &HashMap<String, String>) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer abc")
      && query.get("namespace").map(String::as_str) == Some("static-us")
  }

  async fn spell(
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
  ) -> Response {
    if !authorized(&headers, &query) {
      return StatusCode::UNAUTHORIZED.into_response();
    }
    match id {
      404 => StatusCode::NOT_FOUND.into_response(),
      503 => (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response(),
      _ => Json(json!({ "id": id, "name": { "en_US": "Fireball", "fr_FR": "Boule de feu" } }))
        .into_response(),
    }
  }

  async fn media(
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
  ) -> Response {
    if !authorized(&headers, &query) {
      return StatusCode::UNAUTHORIZED.into_response();
    }
    match id {
      405 => StatusCode::NOT_FOUND.into_response(),
      _ => Json(json!({ "id": id, "assets": [{ "key": "icon", "value": "icon_fire" }] }))
        .into_response(),
    }
  }

  async fn mock_battlenet(token_requests: Arc<AtomicUsize>) -> BlizzardClient {
    mock_battlenet_with_token_lifetime(token_requests, 86399).await
  }

  async fn mock_battlenet_with_token_lifetime(
    token_requests: Arc<AtomicUsize>,
    expires_in: u64,
  ) -> BlizzardClient {
    let base = serve(
      Router::new()
        .route(
          "/token",
          post(move || {
            token_requests.fetch_add(1, Ordering::SeqCst);
            async move { Json(json!({ "access_token": "abc", "expires_in": expires_in })) }
          }),
        )
        .route("/data/wow/spell/:id", get(spell))
        .route("/data/wow/media/spell/:id", get(media)),
    )
    .await;

    let config = BlizzardConfig {
      api_url: Some(base.clone()),
      oauth_url: format!("{}/token", base),
      ..BlizzardConfig::default()
    };
    BlizzardClient::with_credentials(&config, "id".to_string(), "secret".to_string()).unwrap()
  }

  #[tokio::test]
  async fn test_fetch_combines_spell_and_media() {
    let client = mock_battlenet(Arc::new(AtomicUsize::new(0))).await;

    let spell = client.fetch("123").await.unwrap();
    assert_eq!(spell.id, 123);
    assert_eq!(spell.display_names["en_US"], "Fireball");
    assert_eq!(spell.icon, "icon_fire");
  }

  #[tokio::test]
  async fn test_token_is_reused() {
    let token_requests = Arc::new(AtomicUsize::new(0));
    let client = mock_battlenet(Arc::clone(&token_requests)).await;

    client.fetch("1").await.unwrap();
    client.fetch("2").await.unwrap();
    assert_eq!(token_requests.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_out_of_range_token_lifetime_is_transient() {
    let token_requests = Arc::new(AtomicUsize::new(0));
    let client = mock_battlenet_with_token_lifetime(Arc::clone(&token_requests), u64::MAX).await;

    let fetch = tokio::spawn(async move { client.fetch("1").await });
    let err = fetch.await.expect("fetch task panicked").unwrap_err();
    assert_eq!(
      err,
      CacheError::transient("malformed token response: expires_in out of range")
    );
    assert!(token_requests.load(Ordering::SeqCst) >= 1);
  }

  #[tokio::test]
  async fn test_missing_spell_is_not_found() {
    let client = mock_battlenet(Arc::new(AtomicUsize::new(0))).await;
    assert_eq!(client.fetch("404").await.unwrap_err(), CacheError::NotFound);
  }

  #[tokio::test]
  async fn test_missing_media_is_not_found() {
    let client = mock_battlenet(Arc::new(AtomicUsize::new(0))).await;
    assert_eq!(client.fetch("405").await.unwrap_err(), CacheError::NotFound);
  }

  #[tokio::test]
  async fn test_server_error_is_transient_with_status() {
    let client = mock_battlenet(Arc::new(AtomicUsize::new(0))).await;
    assert_eq!(
      client.fetch("503").await.unwrap_err(),
      CacheError::Transient {
        status: Some(503),
        message: "try later".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_non_numeric_key_never_reaches_upstream() {
    let token_requests = Arc::new(AtomicUsize::new(0));
    let client = mock_battlenet(Arc::clone(&token_requests)).await;

    assert_eq!(client.fetch("abc").await.unwrap_err(), CacheError::NotFound);
    assert_eq!(token_requests.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_unreachable_upstream_is_transient() {
    let config = BlizzardConfig {
      api_url: Some("http://127.0.0.1:9/".to_string()),
      oauth_url: "http://127.0.0.1:9/token".to_string(),
      timeout_secs: 1,
      ..BlizzardConfig::default()
    };
    let client =
      BlizzardClient::with_credentials(&config, "id".to_string(), "secret".to_string()).unwrap();

    assert!(matches!(
      client.fetch("1").await.unwrap_err(),
      CacheError::Transient { status: None, .. }
    ));
  }

  #[test]
  fn test_status_error_uses_reason_for_empty_body() {
    assert_eq!(
      status_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
      CacheError::Transient {
        status: Some(429),
        message: "Too Many Requests".to_string()
      }
    );
    assert_eq!(
      status_error(StatusCode::NOT_FOUND, "gone".to_string()),
      CacheError::NotFound
    );
  }
}
