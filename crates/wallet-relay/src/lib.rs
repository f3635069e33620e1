//! # Wallet Relay
//!
//! The admission and storage core of a Nostr relay that only serves
//! wallet traffic.
//!
//! ## Overview
//!
//! - **Policy**: an immutable allow-list of wallet kinds
//! - **Verification**: every event's id and BIP-340 signature are checked
//! - **Storage**: durable SQLite store with replace-on-insert for
//!   replaceable kinds and author deletions
//! - **Queries and subscriptions**: filter queries over secondary indexes,
//!   followed by live delivery of newly admitted events
//!
//! Transport (WebSocket framing, NIP-11 documents) lives outside this
//! crate; it hands already-decoded events and filters to [`Relay`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wallet_relay::{Relay, RelayConfig, Submission};
//! use wallet_relay::core::{EventBuilder, Filter, Keypair};
//!
//! async fn example() -> wallet_relay::Result<()> {
//!     let config = RelayConfig::from_env().expect("configuration");
//!     let relay = Relay::open(&config)?;
//!
//!     let keypair = Keypair::generate();
//!     let event = EventBuilder::new(7375)
//!         .created_at(1_700_000_000)
//!         .content("encrypted proofs")
//!         .sign(&keypair)
//!         .expect("signing");
//!
//!     if let Submission::Rejected(rejection) = relay.submit(event).await? {
//!         println!("rejected: {rejection}");
//!     }
//!
//!     let mut sub = relay.subscribe(Filter::new().kinds([7375])).await?;
//!     while let Some(event) = sub.next().await {
//!         println!("{}", event.id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `wallet_relay::core` - Events, keys, filters, verification
//! - `wallet_relay::store` - Storage engines and the query matcher

pub mod breaker;
pub mod config;
pub mod error;
pub mod policy;
pub mod relay;
pub mod subscription;

// Re-export component crates
pub use wallet_relay_core as core;
pub use wallet_relay_store as store;

pub use config::{ConfigError, QueryLimits, RelayConfig, RelayInfo};
pub use error::{RelayError, Result};
pub use policy::{KindPolicy, Rejection, RejectionKind, DEFAULT_WALLET_KINDS};
pub use relay::{Relay, Submission};
pub use subscription::Subscription;

pub use wallet_relay_core::{Event, EventBuilder, EventId, Filter, Keypair, PublicKey};
pub use wallet_relay_store::{MemoryStore, PutOutcome, SqliteStore, StoreConfig};
