//! Shared L2 stores behind the in-process maps.
//!
//! A shared store holds opaque byte values with a per-key expiry. The SQLite
//! store is durable and may be shared between processes; the memory store is
//! the degradation target when the shared store fails.
#![forbid(unsafe_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use vicinity_core::CacheKind;

use crate::MAX_TTL;

/// Failure reported by a [`SharedStore`].
#[derive(Debug, Error)]
pub enum SharedStoreError {
    /// The store could not be reached.
    #[error("shared cache unavailable: {message}")]
    Unavailable {
        /// Human-readable reason.
        message: String,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open shared cache at {path}: {source}")]
    Open {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A SQLite statement failed.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Key/value store with per-key expiry used as the L2 cache.
///
/// Implementations provide single-key atomicity; no cross-key transactions
/// are required.
pub trait SharedStore: Send + Sync {
    /// Backend type reported in the cache status.
    fn kind(&self) -> CacheKind;

    /// Fetch an unexpired value.
    ///
    /// # Errors
    /// Returns [`SharedStoreError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError>;

    /// Store `value` for `ttl`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`SharedStoreError`] when the backend cannot be written.
    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SharedStoreError>;

    /// Check connectivity.
    ///
    /// # Errors
    /// Returns [`SharedStoreError`] when the backend does not answer.
    fn ping(&self) -> Result<(), SharedStoreError>;

    /// Number of unexpired keys.
    ///
    /// # Errors
    /// Returns [`SharedStoreError`] when the backend cannot be read.
    fn key_count(&self) -> Result<u64, SharedStoreError>;
}

/// In-process store with per-key deadlines and an entry cap.
#[derive(Debug)]
pub struct MemorySharedStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
    capacity: usize,
}

impl MemorySharedStore {
    /// Empty store holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SharedStore for MemorySharedStore {
    fn kind(&self) -> CacheKind {
        CacheKind::Memory
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some((value, deadline)) if *deadline > now => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SharedStoreError> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.insert(key.to_owned(), (value.to_vec(), deadline_after(now, ttl)));
        if entries.len() > self.capacity {
            entries.retain(|_, (_, deadline)| *deadline > now);
        }
        while entries.len() > self.capacity {
            let soonest = entries
                .iter()
                .min_by_key(|(_, (_, deadline))| *deadline)
                .map(|(k, _)| k.clone());
            match soonest {
                Some(victim) => {
                    entries.remove(&victim);
                }
                None => break,
            }
        }
        Ok(())
    }

    fn ping(&self) -> Result<(), SharedStoreError> {
        Ok(())
    }

    fn key_count(&self) -> Result<u64, SharedStoreError> {
        let now = Instant::now();
        let live = self.lock().values().filter(|(_, d)| *d > now).count();
        Ok(u64::try_from(live).unwrap_or(u64::MAX))
    }
}

/// Instant `ttl` after `now`, with `ttl` capped at [`MAX_TTL`].
fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now)
}

/// Durable store in a SQLite `kv` table keyed by string with millisecond
/// expiry timestamps.
pub struct SqliteSharedStore {
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteSharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSharedStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteSharedStore {
    /// Open or create the cache database.
    ///
    /// # Errors
    /// Returns [`SharedStoreError::Open`] when the file cannot be opened and
    /// [`SharedStoreError::Sqlite`] when the schema cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SharedStoreError> {
        let path_ref = path.as_ref();
        let connection =
            Connection::open(path_ref).map_err(|source| SharedStoreError::Open {
                path: path_ref.to_path_buf(),
                source,
            })?;
        connection.execute_batch(
            "PRAGMA journal_mode = WAL;
             CREATE TABLE IF NOT EXISTS kv (
                 key TEXT PRIMARY KEY,
                 value BLOB NOT NULL,
                 expires_at INTEGER NOT NULL
             );",
        )?;
        Ok(Self {
            path: path_ref.to_path_buf(),
            connection: Mutex::new(connection),
        })
    }

    /// Delete expired rows, returning how many were removed.
    ///
    /// # Errors
    /// Returns [`SharedStoreError::Sqlite`] when the delete fails.
    pub fn purge_expired(&self) -> Result<usize, SharedStoreError> {
        let removed = self
            .lock()
            .execute("DELETE FROM kv WHERE expires_at <= ?1", params![now_millis()])?;
        Ok(removed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl SharedStore for SqliteSharedStore {
    fn kind(&self) -> CacheKind {
        CacheKind::Shared
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SharedStoreError> {
        let value = self
            .lock()
            .prepare_cached("SELECT value FROM kv WHERE key = ?1 AND expires_at > ?2")?
            .query_row(params![key, now_millis()], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), SharedStoreError> {
        let ttl_ms = i64::try_from(ttl.min(MAX_TTL).as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_ms);
        self.lock()
            .prepare_cached("INSERT OR REPLACE INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)")?
            .execute(params![key, value, expires_at])?;
        Ok(())
    }

    fn ping(&self) -> Result<(), SharedStoreError> {
        self.lock().query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn key_count(&self) -> Result<u64, SharedStoreError> {
        let count: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM kv WHERE expires_at > ?1",
            params![now_millis()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[fixture]
    fn sqlite_store() -> (TempDir, SqliteSharedStore) {
        let dir = TempDir::new().expect("create temp dir");
        let store = SqliteSharedStore::open(dir.path().join("cache.db")).expect("open store");
        (dir, store)
    }

    #[rstest]
    fn sqlite_round_trips_values(sqlite_store: (TempDir, SqliteSharedStore)) {
        let (_dir, store) = sqlite_store;
        store.set("k", b"value", HOUR).expect("set");
        assert_eq!(store.get("k").expect("get"), Some(b"value".to_vec()));
        assert_eq!(store.key_count().expect("count"), 1);
        assert_eq!(store.kind(), CacheKind::Shared);
        store.ping().expect("ping");
    }

    #[rstest]
    fn sqlite_hides_and_purges_expired_rows(sqlite_store: (TempDir, SqliteSharedStore)) {
        let (_dir, store) = sqlite_store;
        store.set("gone", b"x", Duration::ZERO).expect("set");
        store.set("kept", b"y", HOUR).expect("set");
        assert_eq!(store.get("gone").expect("get"), None);
        assert_eq!(store.key_count().expect("count"), 1);
        assert_eq!(store.purge_expired().expect("purge"), 1);
    }

    #[rstest]
    fn sqlite_values_survive_reopening() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("cache.db");
        SqliteSharedStore::open(&path)
            .expect("open store")
            .set("k", b"durable", HOUR)
            .expect("set");
        let reopened = SqliteSharedStore::open(&path).expect("reopen store");
        assert_eq!(reopened.get("k").expect("get"), Some(b"durable".to_vec()));
    }

    #[rstest]
    fn memory_store_expires_and_caps_entries() {
        let store = MemorySharedStore::new(2);
        store.set("a", b"1", Duration::ZERO).expect("set");
        assert_eq!(store.get("a").expect("get"), None);
        store.set("b", b"2", HOUR).expect("set");
        store.set("c", b"3", HOUR).expect("set");
        store.set("d", b"4", HOUR * 2).expect("set");
        assert_eq!(store.key_count().expect("count"), 2);
        assert_eq!(store.get("d").expect("get"), Some(b"4".to_vec()));
        assert_eq!(store.kind(), CacheKind::Memory);
    }

    #[rstest]
    fn memory_store_caps_unbounded_lifetimes() {
        let store = MemorySharedStore::new(4);
        store
            .set("forever", b"x", Duration::from_secs(u64::MAX))
            .expect("set");
        assert_eq!(store.get("forever").expect("get"), Some(b"x".to_vec()));
    }

    #[rstest]
    fn sqlite_caps_unbounded_lifetimes(sqlite_store: (TempDir, SqliteSharedStore)) {
        let (_dir, store) = sqlite_store;
        store
            .set("forever", b"x", Duration::from_secs(u64::MAX))
            .expect("set");
        assert_eq!(store.get("forever").expect("get"), Some(b"x".to_vec()));
    }
}
