//! Error types for monitor and registry operations.
//!
//! Failures are terminal results for the call that produced them; nothing
//! here is retried internally. Query paths never produce these — an
//! untracked process degrades to an empty result instead.

use thiserror::Error;

use crate::tag::{Pid, Polarity, Tag};

/// Errors from reference-monitor mutation paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MonitorError {
    /// A context initialization targeted a pid that already holds a
    /// non-empty label or capability set. Guards against re-initialization
    /// hijacking of a live process.
    #[error("process {pid} already holds an initialized security context")]
    AlreadyInitialized {
        /// The pid that was already tracked.
        pid: Pid,
    },

    /// A label edit was attempted without the requisite capability. The
    /// label is left unchanged.
    #[error("process {pid} lacks the {polarity} capability for tag {tag}")]
    CapabilityDenied {
        /// The process whose label was targeted.
        pid: Pid,
        /// The tag involved.
        tag: Tag,
        /// Which right was missing.
        polarity: Polarity,
    },

    /// An operation required an existing tracked process and none was found.
    #[error("no tracked security state for process {pid}")]
    UnknownProcess {
        /// The unknown pid.
        pid: Pid,
    },

    /// A label edit or initialization would grow the label past the largest
    /// size the wire format can carry. The label is left unchanged.
    #[error("process {pid} label is at the {limit}-tag maximum")]
    LabelFull {
        /// The process whose label was targeted.
        pid: Pid,
        /// The enforced maximum.
        limit: usize,
    },
}

/// Errors from the named-tag registry layered above the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The named tag has never been created.
    #[error("unknown tag name '{name}'")]
    UnknownTag {
        /// The absolute tag name that failed to resolve.
        name: String,
    },

    /// The calling principal lacks the positive capability for the tag.
    #[error("principal '{principal}' may not add tag '{name}'")]
    AddDenied {
        /// The calling principal.
        principal: String,
        /// The absolute tag name.
        name: String,
    },

    /// The underlying monitor rejected the mutation.
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}
