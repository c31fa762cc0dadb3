//! Cache store implementations: in-memory, SQLite and no-op.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

use super::traits::{CacheStore, Clock};
use crate::error::{Error, Result};

/// Store implementation that doesn't cache anything.
/// Used when caching is disabled - every lookup misses.
pub struct NoopStore;

impl CacheStore for NoopStore {
  fn get(&self, _key: &str) -> Option<Vec<u8>> {
    None // Always miss
  }

  fn put(&self, _key: &str, _data: &[u8], _ttl: Duration) -> bool {
    false // Discard
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }

  fn backend_name(&self) -> &'static str {
    "none"
  }
}

struct MemoryEntry {
  data: Vec<u8>,
  expires_at: DateTime<Utc>,
}

/// Process-local store. Entries live as long as the process.
pub struct MemoryStore {
  entries: Mutex<HashMap<String, MemoryEntry>>,
  clock: Arc<dyn Clock>,
}

impl MemoryStore {
  pub fn new(clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      clock,
    }
  }
}

impl CacheStore for MemoryStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    let entries = self.entries.lock().ok()?;
    let entry = entries.get(key)?;
    if self.clock.now() < entry.expires_at {
      Some(entry.data.clone())
    } else {
      None
    }
  }

  fn put(&self, key: &str, data: &[u8], ttl: Duration) -> bool {
    let Some(expires_at) = self.clock.now().checked_add_signed(ttl) else {
      warn!(key, "cache TTL out of range, not storing");
      return false;
    };
    let Ok(mut entries) = self.entries.lock() else {
      return false;
    };
    entries.insert(
      key.to_string(),
      MemoryEntry {
        data: data.to_vec(),
        expires_at,
      },
    );
    true
  }

  fn clear(&self) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| Error::unexpected("Cache lock poisoned", e.to_string()))?
      .clear();
    Ok(())
  }

  fn backend_name(&self) -> &'static str {
    "memory"
  }
}

/// Schema for the cache table. Expiry is stored as unix milliseconds.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

/// SQLite-backed store, so cached lists survive between invocations.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  clock: Arc<dyn Clock>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open(clock: Arc<dyn Clock>) -> Result<Self> {
    Self::open_at(&Self::default_path()?, clock)
  }

  /// Open (or create) the store at `path`.
  pub fn open_at(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::unexpected("Failed to create cache directory", e))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::unexpected(
        format!("Failed to open cache database at {}", path.display()),
        e,
      )
    })?;

    Self::from_connection(conn, clock)
  }

  #[cfg(test)]
  pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::unexpected("Failed to open in-memory cache database", e))?;
    Self::from_connection(conn, clock)
  }

  fn from_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| Error::unexpected("Failed to run cache migrations", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
      clock,
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::invalid("Could not determine data directory"))?;

    Ok(data_dir.join("mailctl").join("cache.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::unexpected("Cache lock poisoned", e.to_string()))
  }

  fn lookup(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let now = self.clock.now().timestamp_millis();
    let conn = self.lock()?;

    conn
      .query_row(
        "SELECT data FROM cache_entries WHERE cache_key = ? AND expires_at > ?",
        params![key, now],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| Error::unexpected("Failed to read cache entry", e))
  }

  fn store(&self, key: &str, data: &[u8], ttl: Duration) -> Result<()> {
    let expires_at = self
      .clock
      .now()
      .checked_add_signed(ttl)
      .ok_or_else(|| Error::invalid("cache TTL out of range"))?
      .timestamp_millis();
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (cache_key, data, expires_at) VALUES (?, ?, ?)",
        params![key, data, expires_at],
      )
      .map_err(|e| Error::unexpected("Failed to write cache entry", e))?;
    Ok(())
  }
}

impl CacheStore for SqliteStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    match self.lookup(key) {
      Ok(data) => data,
      Err(e) => {
        warn!(key, error = %e, "cache read failed, treating as miss");
        None
      }
    }
  }

  fn put(&self, key: &str, data: &[u8], ttl: Duration) -> bool {
    match self.store(key, data, ttl) {
      Ok(()) => true,
      Err(e) => {
        warn!(key, error = %e, "cache write failed");
        false
      }
    }
  }

  fn clear(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| Error::unexpected("Failed to clear cache", e))?;
    Ok(())
  }

  fn backend_name(&self) -> &'static str {
    "sqlite"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::test_support::ManualClock;
  use chrono::TimeZone;

  fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
      Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ))
  }

  fn assert_expiry_boundary(store: &dyn CacheStore, clock: &ManualClock) {
    assert!(store.put("domains_25_0", b"[1,2]", Duration::seconds(300)));
    assert_eq!(store.get("domains_25_0"), Some(b"[1,2]".to_vec()));

    clock.advance(Duration::seconds(299));
    assert!(store.has("domains_25_0"));

    clock.advance(Duration::seconds(1));
    assert!(!store.has("domains_25_0"));
    assert_eq!(store.get("domains_25_0"), None);
  }

  #[test]
  fn test_memory_store_expires_at_ttl() {
    let clock = clock();
    let store = MemoryStore::new(clock.clone());
    assert_expiry_boundary(&store, &clock);
  }

  #[test]
  fn test_sqlite_store_expires_at_ttl() {
    let clock = clock();
    let store = SqliteStore::in_memory(clock.clone()).unwrap();
    assert_expiry_boundary(&store, &clock);
  }

  #[test]
  fn test_put_overwrites_stale_entry() {
    let clock = clock();
    let store = SqliteStore::in_memory(clock.clone()).unwrap();

    store.put("tokens_10_1", b"old", Duration::seconds(300));
    clock.advance(Duration::seconds(400));
    assert!(!store.has("tokens_10_1"));

    store.put("tokens_10_1", b"new", Duration::seconds(300));
    assert_eq!(store.get("tokens_10_1"), Some(b"new".to_vec()));
  }

  #[test]
  fn test_sqlite_store_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    let clock = clock();

    {
      let store = SqliteStore::open_at(&path, clock.clone()).unwrap();
      assert!(store.put("templates_25_1", b"[]", Duration::seconds(300)));
    }

    let reopened = SqliteStore::open_at(&path, clock).unwrap();
    assert_eq!(reopened.get("templates_25_1"), Some(b"[]".to_vec()));
  }

  #[test]
  fn test_clear_removes_everything() {
    let clock = clock();
    let store = MemoryStore::new(clock);
    store.put("a", b"1", Duration::seconds(300));
    store.put("b", b"2", Duration::seconds(300));
    store.clear().unwrap();
    assert!(!store.has("a"));
    assert!(!store.has("b"));
  }

  #[test]
  fn test_out_of_range_ttl_is_not_stored() {
    let clock = clock();
    let memory = MemoryStore::new(clock.clone());
    let sqlite = SqliteStore::in_memory(clock).unwrap();

    assert!(!memory.put("domains_25_0", b"[]", Duration::MAX));
    assert!(!sqlite.put("domains_25_0", b"[]", Duration::MAX));
    assert!(!memory.has("domains_25_0"));
    assert!(!sqlite.has("domains_25_0"));
  }

  #[test]
  fn test_noop_store_never_hits() {
    let store = NoopStore;
    assert!(!store.put("senders_25_1", b"[]", Duration::seconds(300)));
    assert!(!store.has("senders_25_1"));
  }
}
