//! Filters: conjunctive queries over event fields.
//!
//! Every present field must match. A set field matches when the event's
//! value is a member; an explicitly empty set matches nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::PublicKey;
use crate::error::FilterError;
use crate::event::Event;
use crate::types::EventId;

/// A client filter.
///
/// Tag constraints use the protocol's `#x` keys and are flattened into the
/// JSON object alongside the fixed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<EventId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<PublicKey>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    #[serde(flatten)]
    pub tags: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = EventId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn authors(mut self, authors: impl IntoIterator<Item = PublicKey>) -> Self {
        self.authors = Some(authors.into_iter().collect());
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Constrain tag `name` to one of `values`.
    pub fn tag<S: Into<String>>(mut self, name: char, values: impl IntoIterator<Item = S>) -> Self {
        self.tags.insert(
            format!("#{name}"),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Tag constraints as `(name, values)` with the `#` stripped.
    pub fn tag_constraints(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tags
            .iter()
            .filter_map(|(key, values)| Some((key.strip_prefix('#')?, values.as_slice())))
    }

    /// Values accepted for tag `name`, if constrained.
    pub fn tag_values(&self, name: &str) -> Option<&[String]> {
        self.tags.get(&format!("#{name}")).map(Vec::as_slice)
    }

    /// Reject filters that cannot be evaluated.
    pub fn validate(&self) -> Result<(), FilterError> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(FilterError::InvertedRange { since, until });
            }
        }

        for key in self.tags.keys() {
            let single_char = key
                .strip_prefix('#')
                .map(|name| name.chars().count() == 1)
                .unwrap_or(false);
            if !single_char {
                return Err(FilterError::UnsupportedKey(key.clone()));
            }
        }

        Ok(())
    }

    /// True if some set field is present but empty, or the limit is zero.
    pub fn matches_nothing(&self) -> bool {
        self.ids.as_ref().is_some_and(Vec::is_empty)
            || self.authors.as_ref().is_some_and(Vec::is_empty)
            || self.kinds.as_ref().is_some_and(Vec::is_empty)
            || self.tags.values().any(Vec::is_empty)
            || self.limit == Some(0)
    }

    /// Whether `event` satisfies every present field.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.contains(&event.pubkey) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if !self.matches_time(event.created_at) {
            return false;
        }

        self.tag_constraints().all(|(name, values)| {
            event
                .tag_values(name)
                .any(|v| values.iter().any(|want| want == v))
        })
    }

    /// Whether `created_at` is within `since..=until`.
    pub fn matches_time(&self, created_at: u64) -> bool {
        self.since.map_or(true, |since| created_at >= since)
            && self.until.map_or(true, |until| created_at <= until)
    }
}
