//! Cache storage trait with in-memory and SQLite implementations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Result, TrackerError};

/// Trait for cache storage backends.
///
/// Keys are fully qualified (namespace included). Values are stored as JSON.
pub trait CacheStorage: Send + Sync {
  /// Get a value, or `None` if it is missing or expired.
  fn get(&self, key: &str) -> Result<Option<Value>>;

  /// Store a value. `ttl = None` keeps it until cleared.
  fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()>;

  /// Remove every entry whose key starts with `prefix`.
  fn clear(&self, prefix: &str) -> Result<()>;
}

/// Compute the absolute expiry for a TTL.
fn expires_at(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
  ttl.map(|ttl| {
    chrono::Duration::from_std(ttl)
      .ok()
      .and_then(|ttl| Utc::now().checked_add_signed(ttl))
      .unwrap_or(DateTime::<Utc>::MAX_UTC)
  })
}

fn lock_poisoned<E: std::fmt::Display>(e: E) -> TrackerError {
  TrackerError::Cache(format!("Lock poisoned: {}", e))
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<Value>> {
    Ok(None) // Always miss
  }

  fn set(&self, _key: &str, _value: &Value, _ttl: Option<Duration>) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear(&self, _prefix: &str) -> Result<()> {
    Ok(())
  }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
  value: Value,
  expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
  fn is_expired(&self) -> bool {
    self.expires_at.is_some_and(|at| at <= Utc::now())
  }
}

/// Process-local storage backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keys of all live entries, sorted.
  pub fn keys(&self) -> Result<Vec<String>> {
    let entries = self.entries.lock().map_err(lock_poisoned)?;
    let mut keys: Vec<String> = entries
      .iter()
      .filter(|(_, entry)| !entry.is_expired())
      .map(|(key, _)| key.clone())
      .collect();
    keys.sort();
    Ok(keys)
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<Value>> {
    let mut entries = self.entries.lock().map_err(lock_poisoned)?;
    match entries.get(key) {
      Some(entry) if entry.is_expired() => {
        entries.remove(key);
        Ok(None)
      }
      Some(entry) => Ok(Some(entry.value.clone())),
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
    let mut entries = self.entries.lock().map_err(lock_poisoned)?;
    entries.insert(
      key.to_string(),
      MemoryEntry {
        value: value.clone(),
        expires_at: expires_at(ttl),
      },
    );
    Ok(())
  }

  fn clear(&self, prefix: &str) -> Result<()> {
    let mut entries = self.entries.lock().map_err(lock_poisoned)?;
    entries.retain(|key, _| !key.starts_with(prefix));
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| TrackerError::Cache(format!("Failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path)?;
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| TrackerError::Cache("Could not determine cache directory".to_string()))?;

    Ok(cache_dir.join("trackr").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock().map_err(lock_poisoned)?;
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    -- milliseconds since epoch, NULL = never expires
    expires_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_expires
    ON cache_entries(expires_at);
"#;

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<Value>> {
    let conn = self.conn.lock().map_err(lock_poisoned)?;

    let row: Option<(Vec<u8>, Option<i64>)> = conn
      .query_row(
        "SELECT data, expires_at FROM cache_entries WHERE key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((_, Some(expires_at))) if expires_at <= Utc::now().timestamp_millis() => {
        conn.execute("DELETE FROM cache_entries WHERE key = ?", params![key])?;
        Ok(None)
      }
      Some((data, _)) => Ok(Some(serde_json::from_slice(&data)?)),
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
    let conn = self.conn.lock().map_err(lock_poisoned)?;
    let data = serde_json::to_vec(value)?;
    let expires_at = expires_at(ttl).map(|at| at.timestamp_millis());

    conn.execute(
      "INSERT OR REPLACE INTO cache_entries (key, data, expires_at) VALUES (?, ?, ?)",
      params![key, data, expires_at],
    )?;

    Ok(())
  }

  fn clear(&self, prefix: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(lock_poisoned)?;
    // substr comparison keeps LIKE wildcards in the prefix literal
    conn.execute(
      "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
      params![prefix],
    )?;
    Ok(())
  }
}
