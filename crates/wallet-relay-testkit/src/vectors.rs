//! Golden test vectors for deterministic verification.
//!
//! Expected values were computed outside this codebase: public keys by
//! secp256k1 point multiplication of the seed, ids as SHA-256 of the
//! compact JSON array. Any implementation of the event model must agree.

use wallet_relay_core::{canonical_json, Event, EventBuilder, Keypair};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Secret key bytes, all equal to this value.
    pub seed: u8,
    pub created_at: u64,
    pub kind: u16,
    pub tags: &'static [&'static [&'static str]],
    pub content: &'static str,
    /// Expected x-only public key (hex).
    pub expected_pubkey: &'static str,
    /// Expected canonical serialization.
    pub expected_canonical: &'static str,
    /// Expected event id (hex).
    pub expected_id: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty regular event",
            seed: 0x01,
            created_at: 0,
            kind: 7376,
            tags: &[],
            content: "",
            expected_pubkey: "1b84c5567b126440995d3ed5aaba0565d71e1834604819ff9c17f5e9d5dd078f",
            expected_canonical: r#"[0,"1b84c5567b126440995d3ed5aaba0565d71e1834604819ff9c17f5e9d5dd078f",0,7376,[],""]"#,
            expected_id: "c617ec53ff1fa13500340ca1df0480d709d6bbc95fe1449b1bfa91a54d5dc466",
        },
        GoldenVector {
            name: "wallet token with d tag",
            seed: 0x02,
            created_at: 1_700_000_000,
            kind: 7375,
            tags: &[&["d", "mint"]],
            content: r#"{"mint":"https://mint.example","proofs":[]}"#,
            expected_pubkey: "4d4b6cd1361032ca9bd2aeb9d900aa4d45d9ead80ac9423374c451a7254d0766",
            expected_canonical: r#"[0,"4d4b6cd1361032ca9bd2aeb9d900aa4d45d9ead80ac9423374c451a7254d0766",1700000000,7375,[["d","mint"]],"{\"mint\":\"https://mint.example\",\"proofs\":[]}"]"#,
            expected_id: "bec4778948d8d19c03ad92581d1918b74e87f8cde40b4696aa5e16444acf7417",
        },
        GoldenVector {
            name: "nutzap info with multi-value tags",
            seed: 0x03,
            created_at: 1_736_870_400,
            kind: 10019,
            tags: &[
                &["relay", "wss://relay.example"],
                &["mint", "https://mint.example", "sat"],
                &["pubkey", "02aa"],
            ],
            content: "",
            expected_pubkey: "531fe6068134503d2723133227c867ac8fa6c83c537e9a44c3c5bdbdcb1fe337",
            expected_canonical: r#"[0,"531fe6068134503d2723133227c867ac8fa6c83c537e9a44c3c5bdbdcb1fe337",1736870400,10019,[["relay","wss://relay.example"],["mint","https://mint.example","sat"],["pubkey","02aa"]],""]"#,
            expected_id: "0a3ec5b29533b7564e08262e993207d61ed750dcdd330fd45a52d44d07f88bd1",
        },
        GoldenVector {
            name: "content needing escapes",
            seed: 0x04,
            created_at: 1,
            kind: 9321,
            tags: &[&["p", "ab"]],
            content: "line\nbreak \"quoted\" tab\t back\\slash \u{1} café \u{1F600}",
            expected_pubkey: "462779ad4aad39514614751a71085f2f10e1c7a593e4e030efb5b8721ce55b0b",
            expected_canonical: "[0,\"462779ad4aad39514614751a71085f2f10e1c7a593e4e030efb5b8721ce55b0b\",1,9321,[[\"p\",\"ab\"]],\"line\\nbreak \\\"quoted\\\" tab\\t back\\\\slash \\u0001 café \u{1F600}\"]",
            expected_id: "7f4f45c146b5964125849b5d3e42c0622a6e19d7f42feae888cab0e706b65c5a",
        },
        GoldenVector {
            name: "deletion by id and address",
            seed: 0x05,
            created_at: 1_700_000_100,
            kind: 5,
            tags: &[
                &["e", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"],
                &["a", "7375:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb:mint"],
            ],
            content: "spent",
            expected_pubkey: "62c0a046dacce86ddd0343c6d3c7c79c2208ba0d9c9cf24a6d046d21d21f90f7",
            expected_canonical: r#"[0,"62c0a046dacce86ddd0343c6d3c7c79c2208ba0d9c9cf24a6d046d21d21f90f7",1700000100,5,[["e","aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"],["a","7375:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb:mint"]],"spent"]"#,
            expected_id: "21d7abeeeee90d7dd8e37a9ebf2c240cebcb91311ec8f2ab37ca7cb4f44efb1c",
        },
    ]
}

/// Sign the event a vector describes.
pub fn event_from_vector(vector: &GoldenVector) -> Event {
    let keypair = Keypair::from_seed(&[vector.seed; 32]).expect("vector seed is a valid key");
    let builder = vector.tags.iter().fold(
        EventBuilder::new(vector.kind)
            .created_at(vector.created_at)
            .content(vector.content),
        |builder, tag| builder.tag(tag.iter().copied()),
    );
    builder.sign(&keypair).expect("event serializes")
}

/// Check every vector. Returns (name, matches, computed id).
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let event = event_from_vector(v);
            let canonical = canonical_json(&event.pubkey, v.created_at, v.kind, &event.tags, v.content)
                .map(|bytes| bytes == v.expected_canonical.as_bytes())
                .unwrap_or(false);
            let hex = event.id.to_hex();
            let matches = canonical
                && event.pubkey.to_hex() == v.expected_pubkey
                && hex == v.expected_id;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}
