//! # Wallet Relay Testkit
//!
//! Testing utilities for the wallet relay.
//!
//! ## Overview
//!
//! - **Golden vectors**: canonical serializations and ids computed
//!   independently of this codebase
//! - **Generators**: proptest strategies for events and filters, plus a
//!   brute-force reference model of what a store should answer
//! - **Fixtures**: signing helpers and temporary on-disk stores
//!
//! ## Golden Vectors
//!
//! ```rust
//! use wallet_relay_testkit::vectors::{all_vectors, event_from_vector};
//!
//! for vector in all_vectors() {
//!     let event = event_from_vector(&vector);
//!     assert_eq!(event.id.to_hex(), vector.expected_id);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use wallet_relay_testkit::generators::{events, filter, reference_query};
//!
//! proptest! {
//!     #[test]
//!     fn query_matches_model(events in events(30), filter in filter()) {
//!         // put every event, then compare query() with reference_query()
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use wallet_relay_testkit::fixtures::TestFixture;
//!
//! let alice = TestFixture::with_seed(1);
//! let token = alice.parameterized(7375, "mint", 100, "proofs");
//! assert_eq!(token.pubkey, alice.public_key());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, temp_store, TestFixture};
pub use generators::{event_from_params, reference_query, surviving, EventParams};
pub use vectors::{all_vectors, event_from_vector, verify_all_vectors, GoldenVector};
