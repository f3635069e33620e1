//! Events: the signed, immutable records a relay accepts and serves.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::canonical::compute_event_id;
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::CoreError;
use crate::types::EventId;

/// Kind of a deletion request.
pub const KIND_DELETION: u16 = 5;

/// Tag that carries the parameter of a parameterized-replaceable event.
pub const PARAMETER_TAG: &str = "d";

/// A signed event.
///
/// Field names match the JSON object clients send, so `serde_json` can read
/// and write events directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// SHA-256 of the canonical serialization.
    pub id: EventId,
    /// Author's x-only public key.
    pub pubkey: PublicKey,
    /// Author-claimed creation time, Unix seconds.
    pub created_at: u64,
    /// Classifies semantics and storage policy.
    pub kind: u16,
    /// Ordered tag lists. The first element of each is the tag name.
    pub tags: Vec<Vec<String>>,
    /// Opaque payload.
    pub content: String,
    /// BIP-340 signature over `id`.
    pub sig: Signature,
}

impl Event {
    /// Recompute the id from the signed fields.
    pub fn compute_id(&self) -> Result<EventId, CoreError> {
        compute_event_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Storage class of this event.
    pub fn class(&self) -> EventClass {
        EventClass::of(self.kind, &self.tags)
    }

    /// The key under which this event replaces older ones, if any.
    pub fn replace_key(&self) -> Option<ReplaceKey> {
        match self.class() {
            EventClass::Replaceable => Some(ReplaceKey::new(self.pubkey, self.kind, None)),
            EventClass::Parameterized(d) => Some(ReplaceKey::new(self.pubkey, self.kind, Some(d))),
            EventClass::Regular | EventClass::Ephemeral => None,
        }
    }

    /// Values (second element) of every tag named `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
    }

    /// `(name, value)` pairs that go into the tag index.
    ///
    /// Only single-character tag names are indexed, since those are the
    /// only ones a filter can constrain.
    pub fn indexed_tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().filter_map(|tag| match tag.as_slice() {
            [name, value, ..] if name.chars().count() == 1 => {
                Some((name.as_str(), value.as_str()))
            }
            _ => None,
        })
    }

    /// True if this event should win over `other` for the same replace key.
    ///
    /// Newer timestamps win; on a tie the lexicographically lower id wins.
    pub fn supersedes(&self, other: &Event) -> bool {
        supersedes(self.created_at, &self.id, other.created_at, &other.id)
    }

    /// Whether this is a deletion request.
    pub fn is_deletion(&self) -> bool {
        self.kind == KIND_DELETION
    }

    /// Event ids referenced by `e` tags. Malformed references are skipped.
    pub fn deletion_targets(&self) -> Vec<EventId> {
        self.tag_values("e")
            .filter_map(|v| EventId::from_hex(v).ok())
            .collect()
    }

    /// Replaceable addresses referenced by `a` tags. Malformed ones are skipped.
    pub fn deletion_addresses(&self) -> Vec<ReplaceKey> {
        self.tag_values("a")
            .filter_map(ReplaceKey::parse_address)
            .collect()
    }
}

/// Ordering rule shared by replacement and query results.
pub fn supersedes(
    created_at: u64,
    id: &EventId,
    other_created_at: u64,
    other_id: &EventId,
) -> bool {
    created_at > other_created_at || (created_at == other_created_at && id < other_id)
}

/// Storage class, derived from kind and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    /// Stored as an independent, immutable record.
    Regular,
    /// Latest per (author, kind).
    Replaceable,
    /// Latest per (author, kind, parameter).
    Parameterized(String),
    /// Delivered to live subscribers only.
    Ephemeral,
}

impl EventClass {
    /// Classify a kind.
    ///
    /// Kinds in the parameterized range without a `d` tag use the empty
    /// parameter. Outside the reserved ranges, a `d` tag alone makes an
    /// event parameterized by its value. Deletions are always regular.
    pub fn of(kind: u16, tags: &[Vec<String>]) -> Self {
        let d = tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(PARAMETER_TAG))
            .map(|tag| tag.get(1).cloned().unwrap_or_default());

        if is_replaceable_kind(kind) {
            EventClass::Replaceable
        } else if is_ephemeral_kind(kind) {
            EventClass::Ephemeral
        } else if is_parameterized_kind(kind) {
            EventClass::Parameterized(d.unwrap_or_default())
        } else if kind == KIND_DELETION {
            EventClass::Regular
        } else if let Some(d) = d {
            EventClass::Parameterized(d)
        } else {
            EventClass::Regular
        }
    }
}

/// 0, 3 and 10000..=19999.
pub fn is_replaceable_kind(kind: u16) -> bool {
    kind == 0 || kind == 3 || (10_000..20_000).contains(&kind)
}

/// 20000..=29999.
pub fn is_ephemeral_kind(kind: u16) -> bool {
    (20_000..30_000).contains(&kind)
}

/// 30000..=39999.
pub fn is_parameterized_kind(kind: u16) -> bool {
    (30_000..40_000).contains(&kind)
}

/// Identity of a replaceable slot: (author, kind[, parameter]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplaceKey {
    pub pubkey: PublicKey,
    pub kind: u16,
    pub parameter: Option<String>,
}

impl ReplaceKey {
    pub fn new(pubkey: PublicKey, kind: u16, parameter: Option<String>) -> Self {
        Self {
            pubkey,
            kind,
            parameter,
        }
    }

    /// Parse a `kind:pubkey:parameter` address from an `a` tag.
    ///
    /// The parameter is ignored for kinds in the replaceable ranges.
    pub fn parse_address(address: &str) -> Option<Self> {
        let mut parts = address.splitn(3, ':');
        let kind: u16 = parts.next()?.parse().ok()?;
        let pubkey = PublicKey::from_hex(parts.next()?).ok()?;
        let parameter = parts.next().unwrap_or_default();

        let parameter = if is_replaceable_kind(kind) {
            None
        } else {
            Some(parameter.to_string())
        };
        Some(Self::new(pubkey, kind, parameter))
    }

    /// Stable text form, used as the unique storage key.
    pub fn to_storage_key(&self) -> String {
        match &self.parameter {
            Some(d) => format!("{}:{}:{}", self.kind, self.pubkey.to_hex(), d),
            None => format!("{}:{}", self.kind, self.pubkey.to_hex()),
        }
    }
}

/// Builder for signed events.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: u16,
    created_at: Option<u64>,
    tags: Vec<Vec<String>>,
    content: String,
}

impl EventBuilder {
    pub fn new(kind: u16) -> Self {
        Self {
            kind,
            created_at: None,
            tags: Vec::new(),
            content: String::new(),
        }
    }

    /// Set the timestamp. Defaults to the current time.
    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Append a tag.
    pub fn tag<I, S>(mut self, tag: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.push(tag.into_iter().map(Into::into).collect());
        self
    }

    /// Set the `d` parameter tag.
    pub fn parameter(self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.tag([PARAMETER_TAG.to_string(), value])
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Compute the id and sign it.
    pub fn sign(self, keypair: &Keypair) -> Result<Event, CoreError> {
        let pubkey = keypair.public_key();
        let created_at = self.created_at.unwrap_or_else(unix_now);
        let id = compute_event_id(&pubkey, created_at, self.kind, &self.tags, &self.content)?;
        let sig = keypair.sign(id.as_bytes());

        Ok(Event {
            id,
            pubkey,
            created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
