//! Secrecy labels: the set of tags attached to a process.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tag::Tag;

/// Upper bound on tags in a single label.
///
/// Enforced both by the monitor on label growth and by the codec on
/// declared list lengths, so any label the monitor holds can round-trip
/// the wire.
pub const MAX_LABEL_TAGS: usize = 4096;

/// A secrecy label: the set of tags a process has been exposed to.
///
/// Membership is unique and order is irrelevant. Labels are cheap to clone
/// and the monitor hands out clones as point-in-time snapshots, so readers
/// never observe a label mid-mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLabel {
    tags: HashSet<Tag>,
}

impl SecurityLabel {
    /// Creates an empty label.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tag`; a no-op if already present.
    pub fn insert(&mut self, tag: Tag) {
        self.tags.insert(tag);
    }

    /// Removes `tag`; a no-op if absent.
    pub fn remove(&mut self, tag: Tag) {
        self.tags.remove(&tag);
    }

    /// Returns whether `tag` is on the label.
    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Number of tags on the label.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true for the empty label.
    ///
    /// Callers must treat "process untracked" and "empty label" identically;
    /// both surface as this.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterates over the tags in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tags.iter().copied()
    }

    /// Tags present in `self` but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = Tag> + 'a {
        self.tags.difference(&other.tags).copied()
    }

    /// Materializes the label into a vector of unspecified order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Tag> {
        self.tags.iter().copied().collect()
    }
}

impl FromIterator<Tag> for SecurityLabel {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl Extend<Tag> for SecurityLabel {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        self.tags.extend(iter);
    }
}

impl fmt::Display for SecurityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted = self.to_vec();
        sorted.sort_unstable();
        write!(f, "{{")?;
        for (i, tag) in sorted.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{tag}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_set_semantics() {
        let mut label = SecurityLabel::new();
        label.insert(Tag(3));
        label.insert(Tag(3));
        assert_eq!(label.len(), 1);
        assert!(label.contains(Tag(3)));
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut label = SecurityLabel::new();
        label.remove(Tag(9));
        assert!(label.is_empty());
    }

    #[test]
    fn difference_yields_leaving_tags() {
        let current: SecurityLabel = [Tag(1), Tag(2), Tag(3)].into_iter().collect();
        let proposed: SecurityLabel = [Tag(2)].into_iter().collect();
        let mut leaving: Vec<Tag> = current.difference(&proposed).collect();
        leaving.sort_unstable();
        assert_eq!(leaving, vec![Tag(1), Tag(3)]);
    }

    #[test]
    fn display_is_sorted() {
        let label: SecurityLabel = [Tag(30), Tag(-1), Tag(7)].into_iter().collect();
        assert_eq!(label.to_string(), "{-1, 7, 30}");
    }
}
