//! SQLite implementation of the EventStore trait.
//!
//! This is the primary storage backend for the wallet relay. It uses
//! rusqlite with bundled SQLite in WAL mode: one writer connection behind a
//! mutex, plus a pool of read-only connections so queries never wait on
//! the write path.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::types::{Type, Value};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use tracing::{debug, info};

use wallet_relay_core::{
    supersedes, Event, EventClass, EventId, PublicKey, Signature, KIND_DELETION,
};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::migration;
use crate::read_pool::{apply_pragma, clamp_i64, ReadPool};
use crate::traits::{EventStore, IndexKey, PutOutcome, ScanEntry, ScanPosition, ScanRange};

/// How long the writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_COLUMNS: &str = "id, pubkey, created_at, kind, tags, content, sig";

/// SQLite-based event store.
///
/// Writes are serialized through a single connection and each runs in one
/// `IMMEDIATE` transaction. Reads use the pool when the database lives on
/// disk, and share the writer connection for in-memory databases.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    readers: Option<ReadPool>,
}

impl SqliteStore {
    /// Open (or create) the store described by `config`.
    ///
    /// Creates the storage directory and runs migrations if needed.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path)?;
        let path = config.database_path();
        Self::open_file(&path, config)
    }

    fn open_file(path: &Path, config: &StoreConfig) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        configure_writer(&conn, config.map_size)?;
        migration::migrate(&mut conn)?;

        let readers = ReadPool::open(path, config.read_connections, config.map_size)?;
        info!(
            path = %path.display(),
            readers = readers.size(),
            map_size = config.map_size,
            "opened event store"
        );

        Ok(Self {
            writer: Mutex::new(conn),
            readers: Some(readers),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing. Nothing survives the store being dropped.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        apply_pragma(&conn, "PRAGMA foreign_keys = ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            writer: Mutex::new(conn),
            readers: None,
        })
    }

    /// Run a read-only operation on a pooled connection.
    fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        match &self.readers {
            Some(pool) => {
                let conn = pool.acquire()?;
                f(&conn)
            }
            None => {
                let conn = self.writer.lock()?;
                f(&conn)
            }
        }
    }

    /// Run `f` inside one write transaction and commit it.
    fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.writer.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn configure_writer(conn: &Connection, map_size: u64) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_pragma(conn, "PRAGMA journal_mode = WAL")?;
    apply_pragma(conn, "PRAGMA synchronous = FULL")?;
    apply_pragma(conn, "PRAGMA foreign_keys = ON")?;
    apply_pragma(conn, &format!("PRAGMA mmap_size = {}", clamp_i64(map_size)))?;

    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
    let max_pages = (clamp_i64(map_size) / page_size.max(1)).max(1);
    apply_pragma(conn, &format!("PRAGMA max_page_count = {}", max_pages))?;
    Ok(())
}

impl EventStore for SqliteStore {
    fn put(&self, event: &Event) -> Result<PutOutcome> {
        if event.class() == EventClass::Ephemeral {
            return Ok(PutOutcome::Ephemeral);
        }
        let created_at = to_sql_time(event.created_at)?;
        let storage_key = event.replace_key().map(|key| key.to_storage_key());
        let tags = encode_tags(&event.tags)?;

        self.write(|tx| {
            if event_exists(tx, &event.id)? {
                return Ok(PutOutcome::Duplicate);
            }
            if is_tombstoned(tx, event, storage_key.as_deref(), created_at)? {
                debug!(id = %event.id, "refusing deleted event");
                return Ok(PutOutcome::Tombstoned);
            }

            let mut previous = None;
            if let Some(key) = storage_key.as_deref() {
                if let Some((existing, existing_at)) = find_by_replace_key(tx, key)? {
                    if !supersedes(event.created_at, &event.id, existing_at, &existing) {
                        return Ok(PutOutcome::Obsolete { newer: existing });
                    }
                    delete_in_tx(tx, &existing)?;
                    previous = Some(existing);
                }
            }

            insert_in_tx(tx, event, created_at, &tags, storage_key.as_deref())?;

            if event.is_deletion() {
                let removed = apply_deletion(tx, event, created_at)?;
                return Ok(PutOutcome::Deletion { removed });
            }

            Ok(match previous {
                Some(previous) => {
                    debug!(id = %event.id, %previous, "replaced event");
                    PutOutcome::Replaced { previous }
                }
                None => PutOutcome::Stored,
            })
        })
    }

    fn get(&self, id: &EventId) -> Result<Option<Event>> {
        self.read(|conn| {
            let mut stmt =
                conn.prepare_cached(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"))?;
            let event = stmt
                .query_row(params![id.as_bytes().as_slice()], row_to_event)
                .optional()?;
            Ok(event)
        })
    }

    fn delete(&self, id: &EventId) -> Result<bool> {
        self.write(|tx| delete_in_tx(tx, id))
    }

    fn scan_page(
        &self,
        index: &IndexKey,
        range: &ScanRange,
        limit: usize,
    ) -> Result<Vec<ScanEntry>> {
        let (sql, values) = scan_sql(index, range, limit);
        self.read(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                let created_at: i64 = row.get(0)?;
                let id = id_column(row, 1)?;
                Ok(ScanPosition::new(from_sql_time(created_at), id))
            })?;
            let entries = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }

    fn count_all(&self) -> Result<u64> {
        self.read(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            Ok(from_sql_time(count))
        })
    }
}

/// Build the keyset-paginated query for one page of an index.
fn scan_sql(index: &IndexKey, range: &ScanRange, limit: usize) -> (String, Vec<Value>) {
    let (table, id_col) = match index {
        IndexKey::Tag(..) => ("event_tags", "event_id"),
        _ => ("events", "id"),
    };

    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    match index {
        IndexKey::Created => {}
        IndexKey::Kind(kind) => {
            clauses.push("kind = ?".into());
            values.push(Value::Integer(i64::from(*kind)));
        }
        IndexKey::Author(pubkey) => {
            clauses.push("pubkey = ?".into());
            values.push(Value::Blob(pubkey.as_bytes().to_vec()));
        }
        IndexKey::AuthorKind(pubkey, kind) => {
            clauses.push("pubkey = ?".into());
            values.push(Value::Blob(pubkey.as_bytes().to_vec()));
            clauses.push("kind = ?".into());
            values.push(Value::Integer(i64::from(*kind)));
        }
        IndexKey::Tag(name, value) => {
            clauses.push("name = ?".into());
            values.push(Value::Text(name.clone()));
            clauses.push("value = ?".into());
            values.push(Value::Text(value.clone()));
        }
    }

    if let Some(since) = range.since {
        clauses.push("created_at >= ?".into());
        values.push(Value::Integer(clamp_i64(since)));
    }
    if let Some(until) = range.until {
        clauses.push("created_at <= ?".into());
        values.push(Value::Integer(clamp_i64(until)));
    }
    if let Some(after) = range.after {
        let at = clamp_i64(after.created_at());
        clauses.push(format!(
            "created_at <= ? AND (created_at < ? OR {id_col} > ?)"
        ));
        values.push(Value::Integer(at));
        values.push(Value::Integer(at));
        values.push(Value::Blob(after.id().as_bytes().to_vec()));
    }

    let filter = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    values.push(Value::Integer(clamp_i64(limit as u64)));

    let sql = format!(
        "SELECT created_at, {id_col} FROM {table}{filter} \
         ORDER BY created_at DESC, {id_col} ASC LIMIT ?"
    );
    (sql, values)
}

fn event_exists(conn: &Connection, id: &EventId) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
        params![id.as_bytes().as_slice()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn is_tombstoned(
    conn: &Connection,
    event: &Event,
    storage_key: Option<&str>,
    created_at: i64,
) -> Result<bool> {
    let by_id: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM deleted_events WHERE event_id = ?1 AND pubkey = ?2)",
        params![event.id.as_bytes().as_slice(), event.pubkey.as_bytes().as_slice()],
        |row| row.get(0),
    )?;
    if by_id {
        return Ok(true);
    }

    let Some(key) = storage_key else {
        return Ok(false);
    };
    let deleted_until: Option<i64> = conn
        .query_row(
            "SELECT deleted_until FROM deleted_addresses WHERE replace_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(deleted_until.is_some_and(|until| created_at <= until))
}

fn find_by_replace_key(conn: &Connection, key: &str) -> Result<Option<(EventId, u64)>> {
    let found = conn
        .query_row(
            "SELECT id, created_at FROM events WHERE replace_key = ?1",
            params![key],
            |row| Ok((id_column(row, 0)?, from_sql_time(row.get(1)?))),
        )
        .optional()?;
    Ok(found)
}

fn insert_in_tx(
    tx: &Transaction<'_>,
    event: &Event,
    created_at: i64,
    tags: &[u8],
    storage_key: Option<&str>,
) -> Result<()> {
    tx.execute(
        "INSERT INTO events (id, pubkey, created_at, kind, tags, content, sig, replace_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.id.as_bytes().as_slice(),
            event.pubkey.as_bytes().as_slice(),
            created_at,
            i64::from(event.kind),
            tags,
            event.content,
            event.sig.as_bytes().as_slice(),
            storage_key,
        ],
    )?;

    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO event_tags (event_id, name, value, created_at)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (name, value) in event.indexed_tags() {
        stmt.execute(params![event.id.as_bytes().as_slice(), name, value, created_at])?;
    }
    Ok(())
}

/// Tag rows go with their event through `ON DELETE CASCADE`.
fn delete_in_tx(conn: &Connection, id: &EventId) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM events WHERE id = ?1",
        params![id.as_bytes().as_slice()],
    )?;
    Ok(changed > 0)
}

/// Remove what a deletion request references and record tombstones.
///
/// Only events by the deletion's own author are touched. Deletion requests
/// themselves cannot be deleted.
fn apply_deletion(tx: &Transaction<'_>, deletion: &Event, created_at: i64) -> Result<Vec<EventId>> {
    let mut removed = Vec::new();

    for target in deletion.deletion_targets() {
        if target == deletion.id {
            continue;
        }
        let found: Option<(Vec<u8>, i64)> = tx
            .query_row(
                "SELECT pubkey, kind FROM events WHERE id = ?1",
                params![target.as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((pubkey, kind)) = found {
            let same_author = pubkey.as_slice() == deletion.pubkey.as_bytes().as_slice();
            if same_author && kind != i64::from(KIND_DELETION) && delete_in_tx(tx, &target)? {
                removed.push(target);
            }
        }

        tx.execute(
            "INSERT OR IGNORE INTO deleted_events (event_id, pubkey) VALUES (?1, ?2)",
            params![
                target.as_bytes().as_slice(),
                deletion.pubkey.as_bytes().as_slice()
            ],
        )?;
    }

    for address in deletion.deletion_addresses() {
        if address.pubkey != deletion.pubkey {
            continue;
        }
        let key = address.to_storage_key();
        if let Some((existing, existing_at)) = find_by_replace_key(tx, &key)? {
            if to_sql_time(existing_at)? <= created_at && delete_in_tx(tx, &existing)? {
                removed.push(existing);
            }
        }

        tx.execute(
            "INSERT INTO deleted_addresses (replace_key, deleted_until) VALUES (?1, ?2)
             ON CONFLICT(replace_key) DO UPDATE
             SET deleted_until = MAX(deleted_until, excluded.deleted_until)",
            params![key, created_at],
        )?;
    }

    debug!(id = %deletion.id, removed = removed.len(), "applied deletion");
    Ok(removed)
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let tags_cbor: Vec<u8> = row.get(4)?;
    let tags: Vec<Vec<String>> = ciborium::from_reader(&tags_cbor[..])
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Blob, Box::new(e)))?;

    let kind: i64 = row.get(3)?;
    let kind = u16::try_from(kind)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?;

    Ok(Event {
        id: id_column(row, 0)?,
        pubkey: PublicKey::from_bytes(fixed_blob(row, 1)?),
        created_at: from_sql_time(row.get(2)?),
        kind,
        tags,
        content: row.get(5)?,
        sig: Signature::from_bytes(fixed_blob(row, 6)?),
    })
}

fn id_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<EventId> {
    fixed_blob(row, idx).map(EventId::from_bytes)
}

fn fixed_blob<const N: usize>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<[u8; N]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, format!("blob[{N}]"), Type::Blob)
    })
}

fn encode_tags(tags: &[Vec<String>]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(tags, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn to_sql_time(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("timestamp {value} exceeds storage range")))
}

fn from_sql_time(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
