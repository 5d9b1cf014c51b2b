//! Core identifier types for the DIFC monitor.
//!
//! Tags are opaque 64-bit values asserted by callers; the monitor never
//! interprets them beyond equality. Process identities come from the host
//! process model and are equally opaque to the monitor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque secrecy tag.
///
/// A tag stands for one category of sensitive information. The monitor
/// compares tags for equality and nothing else; values are chosen by callers
/// (or allocated by the [`TagRegistry`](crate::registry::TagRegistry)) and
/// uniqueness is caller-assured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tag(pub i64);

impl Tag {
    /// Returns the raw wire value of this tag.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Tag {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Host process identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Host user identifier.
///
/// Carried through [`ProcessSecurityContext`](crate::context::ProcessSecurityContext)
/// as informational metadata; never consulted for an authorization decision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Uid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// The direction of a capability.
///
/// A positive capability is the right to add the tag to a label (taint); a
/// negative capability is the right to remove it (declassify).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    /// Right to add the tag to a label.
    Positive,
    /// Right to remove the tag from a label.
    Negative,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => f.write_str("positive"),
            Self::Negative => f.write_str("negative"),
        }
    }
}

/// One edit applied to a capability set for a single `(tag, polarity)` axis.
///
/// `None` is an explicit no-op: the legacy tri-state wire encoding reserves
/// `0` for "leave this axis alone", and that meaning is made explicit here at
/// the decode boundary rather than interpreted downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityEdit {
    /// Leave the capability as it is.
    #[default]
    None,
    /// Grant the right.
    Grant,
    /// Revoke the right.
    Revoke,
}

impl fmt::Display for CapabilityEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Grant => f.write_str("grant"),
            Self::Revoke => f.write_str("revoke"),
        }
    }
}
