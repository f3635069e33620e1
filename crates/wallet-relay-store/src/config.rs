//! Storage engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default storage ceiling in bytes (256 GiB).
pub const DEFAULT_MAP_SIZE: u64 = 1 << 38;

/// Default number of read-only connections.
pub const DEFAULT_READ_CONNECTIONS: usize = 4;

/// Name of the database file inside the storage directory.
pub const DATABASE_FILE: &str = "events.db";

/// Configuration for [`crate::SqliteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage directory. Created if missing.
    pub path: PathBuf,

    /// Ceiling on the database size, in bytes.
    ///
    /// Also used as the memory-map size. Writes that would grow the file
    /// past it fail with a storage error.
    pub map_size: u64,

    /// Read-only connections available to concurrent readers.
    pub read_connections: usize,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_map_size(mut self, map_size: u64) -> Self {
        self.map_size = map_size;
        self
    }

    pub fn with_read_connections(mut self, read_connections: usize) -> Self {
        self.read_connections = read_connections;
        self
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.path.join(DATABASE_FILE)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./db"),
            map_size: DEFAULT_MAP_SIZE,
            read_connections: DEFAULT_READ_CONNECTIONS,
        }
    }
}
