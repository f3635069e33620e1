//! # Wallet Relay Store
//!
//! Storage engine and query matcher for the wallet relay. Provides a
//! trait-based interface for event persistence with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`EventStore`] - The storage trait: put, get, delete, scan
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`PutOutcome`] - Result of putting an event
//! - [`Scan`] - Lazy, restartable, newest-first index scan
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wallet_relay_store::{query, SqliteStore, StoreConfig};
//! use wallet_relay_core::Filter;
//!
//! let store = SqliteStore::open(&StoreConfig::new("./db")).unwrap();
//! let recent = query::query(&store, &Filter::new().kinds([7375]).limit(10)).unwrap();
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent puts**: Putting the same event twice returns `Duplicate`
//! - **Replace on insert**: a newer event for a replace key removes the older
//!   one in the same transaction
//! - **Tombstones**: events deleted by their author cannot be stored again

pub mod config;
pub mod error;
pub mod memory;
pub mod migration;
pub mod query;
pub mod read_pool;
pub mod scan;
pub mod sqlite;
pub mod traits;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::QueryPlan;
pub use scan::Scan;
pub use sqlite::SqliteStore;
pub use traits::{EventStore, IndexKey, PutOutcome, ScanEntry, ScanPosition, ScanRange};
