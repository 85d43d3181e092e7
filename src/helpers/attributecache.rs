use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to (de)serialize cached value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to create cache directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache lock poisoned")]
    Poisoned,
}

/// Persistent key-value store backed by SQLite. Values are JSON, entries carry an optional
/// expiry (milliseconds since the epoch) and are removed when read after expiry.
///
/// This is the durable tier of the enrichment cache; the in-memory tier lives in front of it.
pub struct AttributeCache {
    db_path: Option<PathBuf>,
    db: Mutex<Connection>,
}

impl AttributeCache {
    /// Open (or create) the cache database at the given path
    pub fn open<P: AsRef<Path>>(db_file: P) -> Result<Self, CacheError> {
        let db_path = db_file.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&db_path)?;
        Self::setup_database(&conn)?;
        info!("Opened attribute cache database at {:?}", db_path);

        Ok(Self {
            db_path: Some(db_path),
            db: Mutex::new(conn),
        })
    }

    /// A cache that lives only as long as the process
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        Self::setup_database(&conn)?;
        Ok(Self { db_path: None, db: Mutex::new(conn) })
    }

    fn setup_database(conn: &Connection) -> Result<(), CacheError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                expires_at INTEGER
            )",
            [],
        )?;
        debug!("Cache table created or verified successfully");
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.db.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Store a value without expiry
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.set_with_expiry(key, value, None)
    }

    /// Store a value that expires after `ttl`
    pub fn set_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = now_ms() + ttl.as_millis() as i64;
        self.set_with_expiry(key, value, Some(expires_at))
    }

    /// Store a value with an absolute expiry in milliseconds since the epoch
    pub fn set_with_expiry<T: Serialize + ?Sized>(&self, key: &str, value: &T, expires_at: Option<i64>) -> Result<(), CacheError> {
        let serialized = serde_json::to_vec(value)?;
        let now = now_ms();
        self.connection()?.execute(
            "INSERT INTO cache (key, value, created_at, updated_at, expires_at)
             VALUES (?1, ?2, ?3, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at,
                 expires_at = excluded.expires_at",
            params![key, serialized, now, expires_at],
        )?;
        debug!("Stored key '{}' in attribute cache with expiry: {:?}", key, expires_at);
        Ok(())
    }

    /// Read a value. Expired entries are deleted and reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        Ok(self.get_with_expiry(key)?.map(|(value, _)| value))
    }

    /// Read a value together with its expiry in milliseconds since the epoch
    pub fn get_with_expiry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<(T, Option<i64>)>, CacheError> {
        let conn = self.connection()?;
        let row: Option<(Vec<u8>, Option<i64>)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((data, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at.map(|at| at <= now_ms()).unwrap_or(false) {
            debug!("Removing expired cache entry: {}", key);
            conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
            return Ok(None);
        }

        match serde_json::from_slice(&data) {
            Ok(value) => Ok(Some((value, expires_at))),
            Err(e) => {
                // Written by an older version with a different layout
                warn!("Dropping undecodable cache entry '{}': {}", key, e);
                conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
                Ok(None)
            }
        }
    }

    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.connection()?.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Delete every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let removed = self.connection()?.execute(
            "DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_ms()],
        )?;
        if removed > 0 {
            info!("Purged {} expired attribute cache entries", removed);
        }
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        let count: i64 = self.connection()?.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
