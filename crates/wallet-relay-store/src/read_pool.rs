//! Read-only SQLite connection pool.
//!
//! SQLite in WAL mode lets readers run alongside the single writer, but
//! only on separate connections. The pool hands out one of those
//! connections per read operation.

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::Result;

/// How long a reader waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A pool of read-only connections.
pub struct ReadPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Open `size` read-only connections to the database at `db_path`.
    ///
    /// The schema must already exist.
    pub fn open(db_path: &Path, size: usize, mmap_size: u64) -> Result<Self> {
        let size = size.max(1);
        let mut connections = Vec::with_capacity(size);

        for _ in 0..size {
            let conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            apply_pragma(&conn, &format!("PRAGMA mmap_size = {}", clamp_i64(mmap_size)))?;
            connections.push(Mutex::new(conn));
        }

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Take a free connection, or wait for one if all are busy.
    pub fn acquire(&self) -> Result<MutexGuard<'_, Connection>> {
        for conn in &self.connections {
            if let Ok(guard) = conn.try_lock() {
                return Ok(guard);
            }
        }

        // All busy: queue on the next one in rotation.
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        Ok(self.connections[slot].lock()?)
    }

    /// Get the pool size.
    pub fn size(&self) -> usize {
        self.connections.len()
    }
}

/// Run a PRAGMA, draining whatever rows it reports back.
pub(crate) fn apply_pragma(conn: &Connection, pragma: &str) -> Result<()> {
    let mut stmt = conn.prepare(pragma)?;
    let mut rows = stmt.query([])?;
    while rows.next()?.is_some() {}
    Ok(())
}

/// SQLite integers are signed.
pub(crate) fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
