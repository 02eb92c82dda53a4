//! SQLite-backed version store.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::{StoreError, Subject};

/// One persisted observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    pub subject: Subject,
    pub identifier: String,
    /// When this identifier was first recorded.
    pub observed_at: DateTime<Utc>,
}

/// Durable map from [`Subject`] to last-seen build identifier.
///
/// There is no in-memory cache: every read goes to SQLite, so a failed
/// write can never leave a stale optimistic value behind.
#[derive(Debug)]
pub struct VersionStore {
    conn: Connection,
}

impl VersionStore {
    /// Opens (or creates) the database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        info!(path = %path.display(), "version store opened");
        Ok(store)
    }

    /// Opens an existing database without write access.
    ///
    /// Used for inspection; every write through this handle fails.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Fresh, empty, non-persistent store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
              id INTEGER PRIMARY KEY,
              kind TEXT NOT NULL,
              item_id TEXT NOT NULL,
              version TEXT NOT NULL,
              last_updated TEXT NOT NULL,
              UNIQUE(kind, item_id)
            );
            "#,
        )?;
        Ok(())
    }

    /// Compares `observed` with the stored identifier for `subject`.
    ///
    /// If they differ (or nothing is stored yet) the new value is
    /// written and `true` is returned. If they match, storage is left
    /// untouched and `false` is returned. The read and the write happen
    /// in one transaction.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the read or the write fails; in that
    /// case the previous value is still the one on disk.
    pub fn record_and_diff(&mut self, subject: &Subject, observed: &str) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;

        let previous: Option<String> = tx
            .query_row(
                "SELECT version FROM versions WHERE kind = ?1 AND item_id = ?2",
                params![subject.kind(), subject.item_id()],
                |row| row.get(0),
            )
            .optional()?;

        if previous.as_deref() == Some(observed) {
            return Ok(false);
        }

        tx.execute(
            r#"
            INSERT INTO versions(kind, item_id, version, last_updated)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(kind, item_id) DO UPDATE SET version=excluded.version, last_updated=excluded.last_updated
            "#,
            params![
                subject.kind(),
                subject.item_id(),
                observed,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;

        debug!(
            %subject,
            previous = previous.as_deref().unwrap_or("<none>"),
            observed,
            "build identifier changed"
        );
        Ok(true)
    }

    /// The stored identifier for `subject`, if any.
    pub fn last_seen(&self, subject: &Subject) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT version FROM versions WHERE kind = ?1 AND item_id = ?2",
                params![subject.kind(), subject.item_id()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// All stored records, game first, then addons by id.
    pub fn records(&self) -> Result<Vec<BuildRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, item_id, version, last_updated FROM versions ORDER BY kind, item_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (kind, item_id, identifier, observed_at) = row?;
            let label = format!("{kind}:{item_id}");
            let subject = Subject::from_parts(&kind, item_id).ok_or_else(|| StoreError::Corrupt {
                subject: label.clone(),
                reason: format!("unknown kind {kind:?}"),
            })?;
            let observed_at = DateTime::parse_from_rfc3339(&observed_at)
                .map_err(|e| StoreError::Corrupt {
                    subject: label,
                    reason: e.to_string(),
                })?
                .with_timezone(&Utc);
            records.push(BuildRecord {
                subject,
                identifier,
                observed_at,
            });
        }
        Ok(records)
    }
}
