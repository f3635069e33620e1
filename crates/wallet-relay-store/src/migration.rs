//! Database schema migrations for SQLite.
//!
//! Versioned, forward-only. Each migration moves the schema from version
//! N-1 to N inside the same transaction that records it.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_secs()],
            )?;
        }

        tx.commit()?;
        info!(from = current, to = CURRENT_VERSION, "migrated event store schema");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: events, tag index, tombstones.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE events (
            id BLOB PRIMARY KEY,              -- 32 bytes, SHA-256 of canonical JSON
            pubkey BLOB NOT NULL,             -- 32 bytes, x-only secp256k1 key
            created_at INTEGER NOT NULL,      -- Unix seconds
            kind INTEGER NOT NULL,
            tags BLOB NOT NULL,               -- CBOR array of string arrays
            content TEXT NOT NULL,
            sig BLOB NOT NULL,                -- 64 bytes, BIP-340 signature
            replace_key TEXT                  -- NULL unless replaceable
        );

        -- One event per replaceable slot
        CREATE UNIQUE INDEX idx_events_replace_key
            ON events(replace_key) WHERE replace_key IS NOT NULL;

        -- Secondary indexes, all in scan order: newest first, then lowest id
        CREATE INDEX idx_events_created ON events(created_at DESC, id);
        CREATE INDEX idx_events_kind ON events(kind, created_at DESC, id);
        CREATE INDEX idx_events_pubkey ON events(pubkey, created_at DESC, id);
        CREATE INDEX idx_events_pubkey_kind ON events(pubkey, kind, created_at DESC, id);

        -- Single-letter tags, denormalized with the timestamp
        CREATE TABLE event_tags (
            event_id BLOB NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (event_id, name, value)
        );

        CREATE INDEX idx_event_tags_scan ON event_tags(name, value, created_at DESC, event_id);

        -- Ids deleted by an author; the author may not publish them again
        CREATE TABLE deleted_events (
            event_id BLOB NOT NULL,
            pubkey BLOB NOT NULL,
            PRIMARY KEY (event_id, pubkey)
        );

        -- Replaceable slots deleted up to a timestamp
        CREATE TABLE deleted_addresses (
            replace_key TEXT PRIMARY KEY,
            deleted_until INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
