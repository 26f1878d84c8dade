//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::Cacheable;

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
  /// The entity replaced whatever was stored (or was the first write).
  Written,
  /// A record with a newer `fetched_at` was already stored; nothing changed.
  Superseded,
}

/// Trait for cache storage backends.
///
/// Each call is atomic on its own. Upserts replace the stored entity wholesale
/// but never with one whose `fetched_at` is older than what is stored.
pub trait CacheStorage: Send + Sync + 'static {
  /// Get a single entity by key.
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<T>>;

  /// Store a single entity, keyed by its `cache_key`.
  fn upsert_entity<T: Cacheable>(&self, entity: &T) -> Result<Upsert>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (creating if needed) the database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database. Contents are lost on drop.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("spellmeta").join("cache.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
///
/// `fetched_at` is unix milliseconds, duplicated out of `data` so the upsert
/// guard can compare it in SQL.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    fetched_at INTEGER NOT NULL,
    PRIMARY KEY (entity_type, entity_key)
);
"#;

impl CacheStorage for SqliteStorage {
  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<T>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM entity_cache WHERE entity_type = ? AND entity_key = ?",
        params![T::entity_type(), entity_key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached {} {}: {}", T::entity_type(), entity_key, e))?;

    data
      .map(|data| {
        serde_json::from_slice(&data).map_err(|e| eyre!("Failed to deserialize entity: {}", e))
      })
      .transpose()
  }

  fn upsert_entity<T: Cacheable>(&self, entity: &T) -> Result<Upsert> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data =
      serde_json::to_vec(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    let changed = conn
      .execute(
        "INSERT INTO entity_cache (entity_type, entity_key, data, fetched_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (entity_type, entity_key) DO UPDATE
           SET data = excluded.data, fetched_at = excluded.fetched_at
           WHERE excluded.fetched_at >= entity_cache.fetched_at",
        params![
          T::entity_type(),
          entity.cache_key(),
          data,
          entity.fetched_at().timestamp_millis()
        ],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

    Ok(if changed == 0 {
      Upsert::Superseded
    } else {
      Upsert::Written
    })
  }
}
