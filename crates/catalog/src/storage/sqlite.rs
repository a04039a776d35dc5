//! SQLite-backed list cache with zstd-compressed payloads

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{ListStore, StoreError, check_unique};
use crate::models::{Item, ItemId, ListIdentity};

/// zstd level for cached payloads
const COMPRESSION_LEVEL: i32 = 3;

/// Database migrations
///
/// Applied in order; the user_version pragma tracks which ones already ran.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: cached list rows
        M::up(
            r#"
            CREATE TABLE list_items (
                identity TEXT NOT NULL,
                item_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                payload BLOB NOT NULL,  -- zstd compressed JSON
                cached_at TEXT NOT NULL,
                PRIMARY KEY (identity, item_id)
            );

            CREATE INDEX idx_list_items_order
                ON list_items(identity, position ASC);
            "#,
        ),
        // Migration 2: per-list refresh bookkeeping
        M::up(
            r#"
            CREATE TABLE list_meta (
                identity TEXT PRIMARY KEY,
                last_refreshed_at TEXT NOT NULL
            );
            "#,
        ),
    ])
}

/// Durable implementation of [`ListStore`]
///
/// All writes run inside one SQLite transaction behind a single connection
/// mutex, so writers never interleave and a failed write rolls back completely.
pub struct SqliteListStore {
    conn: Mutex<Connection>,
}

impl SqliteListStore {
    /// Open (or create) the cache database at `db_path` and migrate it
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut conn = Connection::open(db_path.as_ref())?;

        // Performance pragmas
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations().to_latest(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert rows at consecutive positions starting at `start`
    fn insert_rows(
        tx: &Transaction<'_>,
        identity: &ListIdentity,
        items: &[Item],
        payloads: Vec<Vec<u8>>,
        start: i64,
    ) -> Result<(), StoreError> {
        let cached_at = Utc::now().to_rfc3339();
        let mut stmt = tx.prepare(
            "INSERT INTO list_items (identity, item_id, position, payload, cached_at)
             VALUES (?, ?, ?, ?, ?)",
        )?;

        for (i, (item, payload)) in items.iter().zip(payloads).enumerate() {
            let inserted = stmt.execute(params![
                identity.as_str(),
                item.id.as_str(),
                start + i as i64,
                payload,
                cached_at,
            ]);
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Conflict {
                        identity: identity.clone(),
                        item: item.id.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

/// Serialize and compress payloads up front so encoding errors never reach a transaction
fn encode_payloads(items: &[Item]) -> Result<Vec<Vec<u8>>, StoreError> {
    items
        .iter()
        .map(|item| {
            let json =
                serde_json::to_vec(&item.payload).map_err(|e| StoreError::Codec(e.to_string()))?;
            zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
                .map_err(|e| StoreError::Codec(e.to_string()))
        })
        .collect()
}

fn decode_payload(data: &[u8]) -> Result<serde_json::Value, StoreError> {
    let json = zstd::decode_all(data).map_err(|e| StoreError::Codec(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| StoreError::Codec(e.to_string()))
}

impl ListStore for SqliteListStore {
    fn replace_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        check_unique(identity, items, |_| false)?;
        let payloads = encode_payloads(items)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM list_items WHERE identity = ?",
            [identity.as_str()],
        )?;
        Self::insert_rows(&tx, identity, items, payloads, 0)?;
        tx.execute(
            "INSERT INTO list_meta (identity, last_refreshed_at) VALUES (?, ?)
             ON CONFLICT(identity) DO UPDATE SET last_refreshed_at = excluded.last_refreshed_at",
            params![identity.as_str(), Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        debug!(
            "[STORE] Replaced {} rows with {} for {}",
            removed,
            items.len(),
            identity
        );
        Ok(())
    }

    fn append_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        check_unique(identity, items, |_| false)?;
        let payloads = encode_payloads(items)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let start: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM list_items WHERE identity = ?",
            [identity.as_str()],
            |row| row.get(0),
        )?;
        Self::insert_rows(&tx, identity, items, payloads, start)?;

        tx.commit()?;
        debug!("[STORE] Appended {} rows to {}", items.len(), identity);
        Ok(())
    }

    fn prepend_all(&self, identity: &ListIdentity, items: &[Item]) -> Result<(), StoreError> {
        check_unique(identity, items, |_| false)?;
        let payloads = encode_payloads(items)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let first: i64 = tx.query_row(
            "SELECT COALESCE(MIN(position), 0) FROM list_items WHERE identity = ?",
            [identity.as_str()],
            |row| row.get(0),
        )?;
        Self::insert_rows(&tx, identity, items, payloads, first - items.len() as i64)?;

        tx.commit()?;
        debug!("[STORE] Prepended {} rows to {}", items.len(), identity);
        Ok(())
    }

    fn read_page(
        &self,
        identity: &ListIdentity,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT item_id, payload FROM list_items
             WHERE identity = ?
             ORDER BY position ASC
             LIMIT ? OFFSET ?",
        )?;

        let rows: Vec<(String, Vec<u8>)> = stmt
            .query_map(
                params![identity.as_str(), limit as i64, offset as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, data)| {
                Ok(Item {
                    id: ItemId::new(id),
                    payload: decode_payload(&data)?,
                })
            })
            .collect()
    }

    fn count(&self, identity: &ListIdentity) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM list_items WHERE identity = ?",
            [identity.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn last_refreshed_at(
        &self,
        identity: &ListIdentity,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT last_refreshed_at FROM list_meta WHERE identity = ?",
                [identity.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }))
    }

    fn evict(&self, identity: &ListIdentity) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM list_items WHERE identity = ?",
            [identity.as_str()],
        )?;
        tx.execute("DELETE FROM list_meta WHERE identity = ?", [identity.as_str()])?;
        tx.commit()?;
        debug!("[STORE] Evicted {}", identity);
        Ok(())
    }

    fn evict_all(&self) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM list_items", [])?;
        tx.execute("DELETE FROM list_meta", [])?;
        tx.commit()?;
        debug!("[STORE] Evicted all lists");
        Ok(())
    }
}
