//! SQLite cache with TTL-bounded entries keyed by logical query.

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;

/// Fixed-width UTC timestamp, so string order equals time order in SQL.
const STORED_AT_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

/// Longest honoured TTL (about a century). Larger settings are clamped.
pub const MAX_TTL_MINUTES: u64 = 100 * 365 * 24 * 60;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timestamp: {0}")]
    Timestamp(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub total: u64,
    pub valid: u64,
    pub expired: u64,
    pub ttl_minutes: u64,
}

/// TTL cache for API responses and assembled quotes.
///
/// Every public operation absorbs storage errors: a failed read is a miss,
/// a failed write is skipped. A disabled cache answers every call with the
/// empty result.
pub struct Cache {
    conn: Option<Mutex<Connection>>,
    ttl: Duration,
}

impl Cache {
    /// Open or create cache at `path`. Creates parent dirs if needed.
    pub fn open(path: impl AsRef<Path>, ttl_minutes: u64) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_data (
                cache_key TEXT PRIMARY KEY,
                serialized_value TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_cache_stored_at ON cache_data(stored_at);
            "#,
        )?;
        Ok(Self {
            conn: Some(Mutex::new(conn)),
            ttl: ttl_from_minutes(ttl_minutes),
        })
    }

    /// A cache that stores nothing.
    pub fn disabled() -> Self {
        Self {
            conn: None,
            ttl: Duration::ZERO,
        }
    }

    /// Build from configuration. An unopenable database degrades to a disabled cache.
    pub fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        match Self::open(&config.database, config.duration_minutes) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(path = %config.database.display(), error = %e, "cache unavailable, continuing without it");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    pub fn ttl_minutes(&self) -> u64 {
        self.ttl.whole_minutes().max(0) as u64
    }

    /// Fresh value for `key`, or None. A stale entry is deleted on the way out.
    pub fn get(&self, key: &str) -> Option<Value> {
        let conn = self.conn.as_ref()?;
        match self.try_get(conn, key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Insert or replace `key`, stamped with the current time.
    pub fn set(&self, key: &str, value: &Value) {
        self.set_at(key, value, OffsetDateTime::now_utc());
    }

    /// Typed read; an entry that no longer deserializes counts as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "cached value has unexpected shape");
                None
            }
        }
    }

    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, &v),
            Err(e) => warn!(key, error = %e, "value not serializable, not cached"),
        }
    }

    /// Remove every entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        let Some(conn) = self.conn.as_ref() else {
            return 0;
        };
        let res = lock(conn).and_then(|c| Ok(c.execute("DELETE FROM cache_data", [])?));
        match res {
            Ok(n) => {
                info!(removed = n, "cache cleared");
                n
            }
            Err(e) => {
                warn!(error = %e, "cache clear failed");
                0
            }
        }
    }

    /// Remove entries older than the TTL. Returns the number removed.
    pub fn clean_expired(&self) -> usize {
        let Some(conn) = self.conn.as_ref() else {
            return 0;
        };
        let res = self.cutoff().and_then(|cutoff| {
            let c = lock(conn)?;
            Ok(c.execute(
                "DELETE FROM cache_data WHERE stored_at <= ?1",
                [cutoff],
            )?)
        });
        match res {
            Ok(n) => {
                if n > 0 {
                    info!(removed = n, "expired cache entries removed");
                }
                n
            }
            Err(e) => {
                warn!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let Some(conn) = self.conn.as_ref() else {
            return CacheStats::default();
        };
        let res = self.cutoff().and_then(|cutoff| {
            let c = lock(conn)?;
            let total: i64 = c.query_row("SELECT COUNT(*) FROM cache_data", [], |r| r.get(0))?;
            let valid: i64 = c.query_row(
                "SELECT COUNT(*) FROM cache_data WHERE stored_at > ?1",
                [cutoff],
                |r| r.get(0),
            )?;
            Ok((total as u64, valid as u64))
        });
        match res {
            Ok((total, valid)) => CacheStats {
                enabled: true,
                total,
                valid,
                expired: total.saturating_sub(valid),
                ttl_minutes: self.ttl_minutes(),
            },
            Err(e) => {
                warn!(error = %e, "cache stats failed");
                CacheStats {
                    enabled: true,
                    ttl_minutes: self.ttl_minutes(),
                    ..Default::default()
                }
            }
        }
    }

    pub(crate) fn set_at(&self, key: &str, value: &Value, stored_at: OffsetDateTime) {
        let Some(conn) = self.conn.as_ref() else {
            return;
        };
        let res = serde_json::to_string(value)
            .map_err(CacheError::from)
            .and_then(|json| {
                let stamp = format_stamp(stored_at)?;
                let c = lock(conn)?;
                c.execute(
                    "INSERT OR REPLACE INTO cache_data (cache_key, serialized_value, stored_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![key, json, stamp],
                )?;
                Ok(())
            });
        match res {
            Ok(()) => debug!(key, "cache store"),
            Err(e) => warn!(key, error = %e, "cache write failed"),
        }
    }

    fn try_get(&self, conn: &Mutex<Connection>, key: &str) -> Result<Option<Value>, CacheError> {
        let c = lock(conn)?;
        let row = c
            .query_row(
                "SELECT serialized_value, stored_at FROM cache_data WHERE cache_key = ?1",
                [key],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((json, stamp)) = row else {
            debug!(key, "cache miss");
            return Ok(None);
        };
        let fresh = parse_stamp(&stamp)
            .map(|stored| OffsetDateTime::now_utc() - stored < self.ttl)
            .unwrap_or(false);
        if !fresh {
            debug!(key, stored_at = %stamp, "cache entry stale");
            c.execute("DELETE FROM cache_data WHERE cache_key = ?1", [key])?;
            return Ok(None);
        }
        debug!(key, "cache hit");
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn cutoff(&self) -> Result<String, CacheError> {
        let cutoff = OffsetDateTime::now_utc()
            .checked_sub(self.ttl)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        format_stamp(cutoff)
    }
}

fn ttl_from_minutes(minutes: u64) -> Duration {
    let clamped = minutes.min(MAX_TTL_MINUTES);
    i64::try_from(clamped)
        .ok()
        .and_then(|m| m.checked_mul(60))
        .map(Duration::seconds)
        .unwrap_or(Duration::ZERO)
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
    conn.lock()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

fn format_stamp(at: OffsetDateTime) -> Result<String, CacheError> {
    at.to_offset(time::UtcOffset::UTC)
        .format(STORED_AT_FORMAT)
        .map_err(|e| CacheError::Timestamp(e.to_string()))
}

fn parse_stamp(s: &str) -> Result<OffsetDateTime, CacheError> {
    PrimitiveDateTime::parse(s, STORED_AT_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| CacheError::Timestamp(e.to_string()))
}
