mod cache;
mod config;
mod logging;
mod server;
mod spell;
#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cache::{CacheLayer, SqliteStorage};
use crate::spell::client::BlizzardClient;

#[derive(Parser, Debug)]
#[command(name = "spellmeta")]
#[command(about = "A read-through cache for Battle.net spell names and icons")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/spellmeta/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Address to listen on (e.g. 127.0.0.1:3000)
  #[arg(short, long)]
  bind: Option<String>,

  /// SQLite cache database path
  #[arg(short, long)]
  database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration, then apply command line overrides
  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(bind) = args.bind {
    config.server.bind = bind;
  }
  if let Some(database) = args.database {
    config.cache.database = Some(database);
  }

  let _log_guard = logging::init(&config.log)?;

  let database = match &config.cache.database {
    Some(path) => path.clone(),
    None => SqliteStorage::default_path()?,
  };
  let storage = SqliteStorage::open(&database)?;
  let upstream = BlizzardClient::new(&config.blizzard)?;
  let cache =
    CacheLayer::new(storage, upstream).with_refresh_interval(config.cache.refresh_interval());

  let state = server::AppState::new(cache, config.default_locale.clone());
  let app = server::router(state);

  let listener = tokio::net::TcpListener::bind(&config.server.bind)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", config.server.bind, e))?;
  info!(
    bind = %config.server.bind,
    database = %database.display(),
    refresh_interval_secs = config.cache.refresh_interval_secs,
    region = %config.blizzard.region,
    "spellmeta listening"
  );

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| eyre!("Server error: {}", e))?;

  info!("shut down");
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!("Shutdown signal received");
  }
}
