//! Process security context: the bundle installed at process creation.

use serde::{Deserialize, Serialize};

use crate::label::SecurityLabel;
use crate::tag::{Pid, Tag, Uid};

/// Everything needed to establish a brand-new process's security state in
/// one atomic operation.
///
/// Constructed by the host at process-creation time and consumed exactly
/// once by [`ReferenceMonitor::init_process_context`]; it is not retained
/// afterwards. Any of the three tag lists may be empty — that is the common
/// case, not an error.
///
/// [`ReferenceMonitor::init_process_context`]: crate::monitor::ReferenceMonitor::init_process_context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSecurityContext {
    /// The process being initialized.
    pub pid: Pid,
    /// Owning user. Informational metadata only; never part of an
    /// authorization decision.
    pub uid: Uid,
    /// Initial secrecy label.
    pub sec: Vec<Tag>,
    /// Tags the process initially holds positive capabilities for.
    pub pos: Vec<Tag>,
    /// Tags the process initially holds negative capabilities for.
    pub neg: Vec<Tag>,
}

impl ProcessSecurityContext {
    /// Creates a context with no initial secrecy and no initial capabilities.
    #[must_use]
    pub fn empty(pid: Pid, uid: Uid) -> Self {
        Self {
            pid,
            uid,
            sec: Vec::new(),
            pos: Vec::new(),
            neg: Vec::new(),
        }
    }

    /// The initial label as a [`SecurityLabel`] (deduplicated).
    #[must_use]
    pub fn initial_label(&self) -> SecurityLabel {
        self.sec.iter().copied().collect()
    }
}
