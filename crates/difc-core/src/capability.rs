//! Capability sets: per-tag add/remove rights.
//!
//! A [`CapabilitySet`] maps each tag to the pair of rights a holder has over
//! it. One set exists per monitor instance (the global set) and one per
//! tracked process.
//!
//! # Invariants
//!
//! - A tag absent from the map is equivalent to holding neither right.
//! - The map never stores a both-false entry; an edit that clears the last
//!   right removes the entry outright.
//! - Edits are idempotent: granting a held right or revoking an absent one is
//!   a no-op.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tag::{CapabilityEdit, Polarity, Tag};

/// The pair of rights held over a single tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRights {
    /// Right to add the tag to a label.
    pub positive: bool,
    /// Right to remove the tag from a label.
    pub negative: bool,
}

impl CapabilityRights {
    fn get(self, polarity: Polarity) -> bool {
        match polarity {
            Polarity::Positive => self.positive,
            Polarity::Negative => self.negative,
        }
    }

    fn set(&mut self, polarity: Polarity, held: bool) {
        match polarity {
            Polarity::Positive => self.positive = held,
            Polarity::Negative => self.negative = held,
        }
    }

    fn is_empty(self) -> bool {
        !self.positive && !self.negative
    }
}

/// A mapping from tags to the rights held over them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    entries: HashMap<Tag, CapabilityRights>,
}

impl CapabilitySet {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the given right is held for `tag`.
    #[must_use]
    pub fn has(&self, tag: Tag, polarity: Polarity) -> bool {
        self.entries.get(&tag).is_some_and(|r| r.get(polarity))
    }

    /// Applies one edit to the `(tag, polarity)` axis.
    ///
    /// [`CapabilityEdit::None`] leaves the set untouched. Grant and revoke
    /// are idempotent; an entry whose last right is revoked is removed so
    /// the set never accumulates both-false residue.
    pub fn apply(&mut self, tag: Tag, polarity: Polarity, edit: CapabilityEdit) {
        let held = match edit {
            CapabilityEdit::None => return,
            CapabilityEdit::Grant => true,
            CapabilityEdit::Revoke => false,
        };
        let rights = self.entries.entry(tag).or_default();
        rights.set(polarity, held);
        if rights.is_empty() {
            self.entries.remove(&tag);
        }
    }

    /// Returns true if no rights are held at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tags with at least one right held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over `(tag, rights)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, CapabilityRights)> + '_ {
        self.entries.iter().map(|(t, r)| (*t, *r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_then_check() {
        let mut caps = CapabilitySet::new();
        caps.apply(Tag(7), Polarity::Positive, CapabilityEdit::Grant);
        assert!(caps.has(Tag(7), Polarity::Positive));
        assert!(!caps.has(Tag(7), Polarity::Negative));
        assert!(!caps.has(Tag(8), Polarity::Positive));
    }

    #[test]
    fn grant_is_idempotent() {
        let mut caps = CapabilitySet::new();
        caps.apply(Tag(7), Polarity::Positive, CapabilityEdit::Grant);
        let snapshot = caps.clone();
        caps.apply(Tag(7), Polarity::Positive, CapabilityEdit::Grant);
        assert_eq!(caps, snapshot);
    }

    #[test]
    fn revoke_absent_is_noop() {
        let mut caps = CapabilitySet::new();
        caps.apply(Tag(7), Polarity::Negative, CapabilityEdit::Revoke);
        assert!(caps.is_empty());
    }

    #[test]
    fn none_edit_leaves_set_untouched() {
        let mut caps = CapabilitySet::new();
        caps.apply(Tag(7), Polarity::Positive, CapabilityEdit::None);
        assert!(caps.is_empty());
    }

    #[test]
    fn clearing_last_right_removes_entry() {
        let mut caps = CapabilitySet::new();
        caps.apply(Tag(7), Polarity::Positive, CapabilityEdit::Grant);
        caps.apply(Tag(7), Polarity::Negative, CapabilityEdit::Grant);
        caps.apply(Tag(7), Polarity::Positive, CapabilityEdit::Revoke);
        assert_eq!(caps.len(), 1);
        caps.apply(Tag(7), Polarity::Negative, CapabilityEdit::Revoke);
        // No both-false residue.
        assert!(caps.is_empty());
    }

    #[test]
    fn polarities_are_independent() {
        let mut caps = CapabilitySet::new();
        caps.apply(Tag(1), Polarity::Positive, CapabilityEdit::Grant);
        caps.apply(Tag(1), Polarity::Negative, CapabilityEdit::Revoke);
        assert!(caps.has(Tag(1), Polarity::Positive));
        assert!(!caps.has(Tag(1), Polarity::Negative));
    }
}
