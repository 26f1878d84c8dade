use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_REFRESH_INTERVAL_SECS;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub server: ServerConfig,
  pub cache: CacheConfig,
  /// Locale served when the requested one has no translation
  pub default_locale: Locale,
  pub blizzard: BlizzardConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub bind: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: "0.0.0.0:3000".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before a stored spell is refreshed in the background
  pub refresh_interval_secs: u64,
  /// SQLite database path (defaults to $XDG_DATA_HOME/spellmeta/cache.db)
  pub database: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
      database: None,
    }
  }
}

impl CacheConfig {
  pub fn refresh_interval(&self) -> chrono::Duration {
    // chrono panics past i64::MAX milliseconds
    let max_secs = (i64::MAX / 1000) as u64;
    chrono::Duration::seconds(self.refresh_interval_secs.min(max_secs) as i64)
  }
}

/// Locale code such as "en_US".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Locale(pub String);

impl Default for Locale {
  fn default() -> Self {
    Self("en_US".to_string())
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlizzardConfig {
  /// API region: us, eu, kr or tw
  pub region: String,
  /// Game data API base URL (defaults to https://{region}.api.blizzard.com/)
  pub api_url: Option<String>,
  pub oauth_url: String,
  /// Per-request timeout
  pub timeout_secs: u64,
}

impl Default for BlizzardConfig {
  fn default() -> Self {
    Self {
      region: "us".to_string(),
      api_url: None,
      oauth_url: "https://oauth.battle.net/token".to_string(),
      timeout_secs: 10,
    }
  }
}

impl BlizzardConfig {
  pub fn api_url(&self) -> String {
    self
      .api_url
      .clone()
      .unwrap_or_else(|| format!("https://{}.api.blizzard.com/", self.region))
  }

  /// Namespace for static game data in the configured region.
  pub fn namespace(&self) -> String {
    format!("static-{}", self.region)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Default filter directive; RUST_LOG takes precedence
  pub filter: Option<String>,
  /// Write daily-rotated log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./spellmeta.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/spellmeta/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("spellmeta.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("spellmeta").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the Battle.net client credentials from environment variables.
  ///
  /// Checks SPELLMETA_CLIENT_ID / SPELLMETA_CLIENT_SECRET first, then
  /// BLIZZARD_CLIENT_ID / BLIZZARD_CLIENT_SECRET as fallback.
  pub fn get_client_credentials() -> Result<(String, String)> {
    let id = std::env::var("SPELLMETA_CLIENT_ID")
      .or_else(|_| std::env::var("BLIZZARD_CLIENT_ID"))
      .map_err(|_| {
        eyre!("Battle.net client id not found. Set SPELLMETA_CLIENT_ID or BLIZZARD_CLIENT_ID.")
      })?;
    let secret = std::env::var("SPELLMETA_CLIENT_SECRET")
      .or_else(|_| std::env::var("BLIZZARD_CLIENT_SECRET"))
      .map_err(|_| {
        eyre!(
          "Battle.net client secret not found. Set SPELLMETA_CLIENT_SECRET or BLIZZARD_CLIENT_SECRET."
        )
      })?;

    Ok((id, secret))
  }
}
