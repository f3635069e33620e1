//! # Wallet Relay Core
//!
//! Pure primitives for the wallet relay: events, keys, canonical
//! serialization, signature verification and filters.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over signed event data.
//!
//! ## Key Types
//!
//! - [`Event`] - A signed, immutable record
//! - [`EventId`] - Content-addressed identifier (SHA-256)
//! - [`EventClass`] - Storage class derived from kind and tags
//! - [`ReplaceKey`] - The slot a replaceable event occupies
//! - [`Filter`] - Conjunctive query over event fields
//!
//! ## Canonicalization
//!
//! Ids are computed over the compact JSON array
//! `[0, pubkey, created_at, kind, tags, content]`. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod filter;
pub mod types;
pub mod validation;

pub use canonical::{canonical_json, compute_event_id};
pub use crypto::{Keypair, PublicKey, Signature};
pub use error::{CoreError, FilterError, ValidationError};
pub use event::{
    is_ephemeral_kind, is_parameterized_kind, is_replaceable_kind, supersedes, Event,
    EventBuilder, EventClass, ReplaceKey, KIND_DELETION, PARAMETER_TAG,
};
pub use filter::Filter;
pub use types::EventId;
pub use validation::{validate_event, validate_event_structure, verify_event, MAX_CREATED_AT};
