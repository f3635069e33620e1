//! Admission policy: which kinds the relay accepts.
//!
//! The allow-list is built once from configuration and shared by
//! reference. It is never mutated after startup.

use std::collections::BTreeSet;
use std::fmt;

use wallet_relay_core::{Event, Filter};

/// Reason given when an event's kind is outside the allow-list.
pub const MSG_KIND_NOT_ALLOWED: &str = "invalid-event: only wallet kinds are allowed";

/// Reason given when a filter names a kind outside the allow-list.
pub const MSG_FILTER_KIND_NOT_ALLOWED: &str = "invalid-filter: only wallet kinds are allowed";

/// Reason given when an event fails id or signature verification.
pub const MSG_INVALID_SIGNATURE: &str = "invalid-signature: authentication failed";

/// Reason given when an event was deleted by its author.
pub const MSG_DELETED: &str = "blocked: event was deleted";

/// Kinds used by wallets: contact lists, deletions, Cashu wallet state
/// and history (NIP-60), nutzaps (NIP-61), zaps (NIP-57), Nostr Wallet
/// Connect (NIP-47), handler and mint announcements (NIP-89, NIP-87).
pub const DEFAULT_WALLET_KINDS: &[u16] = &[
    3, 5, 7374, 7375, 7376, 9321, 9734, 9735, 10019, 13194, 17375, 23194, 23195, 31990, 38000,
    38172, 38173,
];

/// Why an event or filter was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Kind is not in the allow-list.
    Policy,
    /// Id or signature does not verify.
    InvalidSignature,
    /// The author already deleted this event.
    Deleted,
}

/// A rejected event or filter, with the reason reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: &'static str,
}

impl Rejection {
    pub const fn kind_not_allowed() -> Self {
        Self {
            kind: RejectionKind::Policy,
            reason: MSG_KIND_NOT_ALLOWED,
        }
    }

    pub const fn filter_not_allowed() -> Self {
        Self {
            kind: RejectionKind::Policy,
            reason: MSG_FILTER_KIND_NOT_ALLOWED,
        }
    }

    pub const fn invalid_signature() -> Self {
        Self {
            kind: RejectionKind::InvalidSignature,
            reason: MSG_INVALID_SIGNATURE,
        }
    }

    pub const fn deleted() -> Self {
        Self {
            kind: RejectionKind::Deleted,
            reason: MSG_DELETED,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason)
    }
}

/// Immutable set of admitted kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPolicy {
    allowed: BTreeSet<u16>,
}

impl KindPolicy {
    /// Build a policy from an explicit allow-list.
    pub fn new(kinds: impl IntoIterator<Item = u16>) -> Self {
        Self {
            allowed: kinds.into_iter().collect(),
        }
    }

    /// The wallet allow-list.
    pub fn wallet() -> Self {
        Self::new(DEFAULT_WALLET_KINDS.iter().copied())
    }

    pub fn allows(&self, kind: u16) -> bool {
        self.allowed.contains(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = u16> + '_ {
        self.allowed.iter().copied()
    }

    /// Admit an event by kind. Signature checks are separate.
    pub fn admit_event(&self, event: &Event) -> Result<(), Rejection> {
        if self.allows(event.kind) {
            Ok(())
        } else {
            Err(Rejection::kind_not_allowed())
        }
    }

    /// Admit a filter. A filter without kinds is allowed; only allowed
    /// kinds are ever stored.
    pub fn admit_filter(&self, filter: &Filter) -> Result<(), Rejection> {
        match &filter.kinds {
            Some(kinds) if !kinds.iter().all(|k| self.allows(*k)) => {
                Err(Rejection::filter_not_allowed())
            }
            _ => Ok(()),
        }
    }
}

impl Default for KindPolicy {
    fn default() -> Self {
        Self::wallet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_relay_core::{EventBuilder, Keypair};

    fn event(kind: u16) -> Event {
        let kp = Keypair::from_seed(&[7; 32]).unwrap();
        EventBuilder::new(kind).created_at(1).sign(&kp).unwrap()
    }

    #[test]
    fn test_wallet_kinds_admitted() {
        let policy = KindPolicy::wallet();
        for kind in DEFAULT_WALLET_KINDS {
            assert!(policy.admit_event(&event(*kind)).is_ok(), "kind {kind}");
        }
    }

    #[test]
    fn test_other_kinds_rejected_with_policy_reason() {
        let policy = KindPolicy::wallet();
        let rejection = policy.admit_event(&event(1)).unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Policy);
        assert_eq!(rejection.reason, "invalid-event: only wallet kinds are allowed");
    }

    #[test]
    fn test_custom_allow_list() {
        let policy = KindPolicy::new([1, 7]);
        assert!(policy.admit_event(&event(1)).is_ok());
        assert!(policy.admit_event(&event(7375)).is_err());
        assert_eq!(policy.kinds().collect::<Vec<_>>(), vec![1, 7]);
    }

    #[test]
    fn test_filter_admission() {
        let policy = KindPolicy::wallet();
        assert!(policy.admit_filter(&Filter::new()).is_ok());
        assert!(policy.admit_filter(&Filter::new().kinds([7375, 10019])).is_ok());

        let rejection = policy
            .admit_filter(&Filter::new().kinds([7375, 1]))
            .unwrap_err();
        assert_eq!(rejection.reason, MSG_FILTER_KIND_NOT_ALLOWED);
    }
}
