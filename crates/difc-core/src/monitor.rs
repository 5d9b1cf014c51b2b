//! The reference monitor: validated, atomic mutation of labels and
//! capability sets.
//!
//! One [`ReferenceMonitor`] instance owns the label store and capability
//! store for the set of processes it tracks. Instances are plain values with
//! no global state, so tests (and embedders) can run any number of isolated
//! monitors side by side.
//!
//! # Locking
//!
//! Per-process state lives behind its own mutex inside a sharded map, so
//! operations on unrelated pids never serialize. The check-then-act of a
//! gated label edit and the snapshot of a label read each hold exactly one
//! per-pid lock for their whole critical section; the global capability set
//! has its own `RwLock` (rare administrative writes). Lock order is always
//! per-pid entry first, then the global set, never the reverse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::capability::CapabilitySet;
use crate::context::ProcessSecurityContext;
use crate::error::MonitorError;
use crate::label::{MAX_LABEL_TAGS, SecurityLabel};
use crate::tag::{CapabilityEdit, Pid, Polarity, Tag};

/// Which capability set a query addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityScope {
    /// The monitor-wide global set.
    Global,
    /// The per-process set of one tracked pid.
    Process(Pid),
}

/// Per-process security state: the secrecy label and the process capability
/// set, guarded together so capability checks and label edits for one pid
/// are a single critical section.
#[derive(Debug, Default)]
struct ProcessEntry {
    label: SecurityLabel,
    caps: CapabilitySet,
}

impl ProcessEntry {
    fn is_empty(&self) -> bool {
        self.label.is_empty() && self.caps.is_empty()
    }
}

/// The DIFC reference monitor.
///
/// Exclusively owns the label and capability stores it mediates; all
/// mutation goes through the validated operations below. Entries are created
/// lazily when a pid first acquires state and reclaimed on
/// [`process_exited`](Self::process_exited); a denied or no-op operation
/// never starts tracking a pid.
#[derive(Debug, Default)]
pub struct ReferenceMonitor {
    processes: RwLock<HashMap<Pid, Arc<Mutex<ProcessEntry>>>>,
    global: RwLock<CapabilitySet>,
}

impl ReferenceMonitor {
    /// Creates a monitor tracking no processes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pid's entry, creating an empty one if absent.
    fn entry(&self, pid: Pid) -> Arc<Mutex<ProcessEntry>> {
        if let Some(entry) = self
            .processes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pid)
        {
            return Arc::clone(entry);
        }
        let mut map = self
            .processes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(pid).or_default())
    }

    /// Returns the pid's entry only if one exists.
    fn existing_entry(&self, pid: Pid) -> Option<Arc<Mutex<ProcessEntry>>> {
        self.processes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pid)
            .map(Arc::clone)
    }

    fn global_has(&self, tag: Tag, polarity: Polarity) -> bool {
        self.global
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .has(tag, polarity)
    }

    /// Returns a point-in-time snapshot of the pid's secrecy label.
    ///
    /// An untracked pid and an empty label are indistinguishable: both yield
    /// the empty label, never a failure. The snapshot is taken under the
    /// per-pid lock, so its size and contents are always mutually
    /// consistent even against concurrent label edits.
    #[must_use]
    pub fn process_label(&self, pid: Pid) -> SecurityLabel {
        match self.existing_entry(pid) {
            Some(entry) => entry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .label
                .clone(),
            None => SecurityLabel::new(),
        }
    }

    /// Atomically installs a new process's label and capability sets.
    ///
    /// The context is consumed; any of its tag lists may be empty. The entry
    /// is built privately and published in one step under the per-pid lock,
    /// so no partially initialized context is ever observable.
    ///
    /// # Errors
    ///
    /// [`MonitorError::AlreadyInitialized`] if the pid already holds a
    /// non-empty label or capability set, [`MonitorError::LabelFull`] if the
    /// initial label exceeds [`MAX_LABEL_TAGS`].
    pub fn init_process_context(
        &self,
        ctx: ProcessSecurityContext,
    ) -> Result<(), MonitorError> {
        let pid = ctx.pid;
        let mut fresh = ProcessEntry {
            label: ctx.initial_label(),
            caps: CapabilitySet::new(),
        };
        if fresh.label.len() > MAX_LABEL_TAGS {
            warn!(%pid, tags = fresh.label.len(), "rejected oversized initial label");
            return Err(MonitorError::LabelFull {
                pid,
                limit: MAX_LABEL_TAGS,
            });
        }
        for tag in &ctx.pos {
            fresh
                .caps
                .apply(*tag, Polarity::Positive, CapabilityEdit::Grant);
        }
        for tag in &ctx.neg {
            fresh
                .caps
                .apply(*tag, Polarity::Negative, CapabilityEdit::Grant);
        }

        let entry = self.entry(pid);
        let mut guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.is_empty() {
            warn!(%pid, "rejected re-initialization of live security context");
            return Err(MonitorError::AlreadyInitialized { pid });
        }

        debug!(
            %pid,
            uid = %ctx.uid,
            sec = fresh.label.len(),
            pos = ctx.pos.len(),
            neg = ctx.neg.len(),
            "initialized process security context"
        );
        *guard = fresh;
        Ok(())
    }

    /// Applies one edit to the global capability set.
    ///
    /// Unconditional once reached: deciding who may issue global edits is
    /// the privilege boundary's job, not the monitor's. Idempotent, and a
    /// [`CapabilityEdit::None`] is a no-op success.
    pub fn edit_global_capability(
        &self,
        tag: Tag,
        polarity: Polarity,
        edit: CapabilityEdit,
    ) {
        if edit == CapabilityEdit::None {
            return;
        }
        self.global
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(tag, polarity, edit);
        debug!(%tag, %polarity, %edit, "edited global capability");
    }

    /// Applies one edit to a process capability set, creating the process
    /// entry lazily if absent. Same authorization stance and idempotence as
    /// [`edit_global_capability`](Self::edit_global_capability).
    pub fn edit_process_capability(
        &self,
        pid: Pid,
        tag: Tag,
        polarity: Polarity,
        edit: CapabilityEdit,
    ) {
        if edit == CapabilityEdit::None {
            return;
        }
        let entry = self.entry(pid);
        entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .caps
            .apply(tag, polarity, edit);
        debug!(%pid, %tag, %polarity, %edit, "edited process capability");
    }

    /// Read-only capability check.
    #[must_use]
    pub fn has_capability(&self, scope: CapabilityScope, tag: Tag, polarity: Polarity) -> bool {
        match scope {
            CapabilityScope::Global => self.global_has(tag, polarity),
            CapabilityScope::Process(pid) => match self.existing_entry(pid) {
                Some(entry) => entry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .caps
                    .has(tag, polarity),
                None => false,
            },
        }
    }

    /// Adds `tag` to the pid's label, gated by the positive capability.
    ///
    /// The capability check and the insertion happen under one per-pid lock;
    /// there is no window in which a concurrent revocation could slip
    /// between check and act. A process-level or a global positive
    /// capability both authorize the taint.
    ///
    /// # Errors
    ///
    /// [`MonitorError::CapabilityDenied`] if neither set grants the right,
    /// [`MonitorError::LabelFull`] if the label is already at
    /// [`MAX_LABEL_TAGS`]; either way the label is left unchanged.
    pub fn add_tag_to_label(&self, pid: Pid, tag: Tag) -> Result<(), MonitorError> {
        self.edit_label(pid, tag, Polarity::Positive)
    }

    /// Removes `tag` from the pid's label, gated by the negative capability
    /// (declassification). Symmetric to [`add_tag_to_label`](Self::add_tag_to_label).
    ///
    /// # Errors
    ///
    /// [`MonitorError::CapabilityDenied`] if neither set grants the right.
    pub fn remove_tag_from_label(&self, pid: Pid, tag: Tag) -> Result<(), MonitorError> {
        self.edit_label(pid, tag, Polarity::Negative)
    }

    fn edit_label(&self, pid: Pid, tag: Tag, polarity: Polarity) -> Result<(), MonitorError> {
        let entry = match self.existing_entry(pid) {
            Some(entry) => entry,
            None => {
                // An untracked pid holds no process capabilities, so only a
                // global grant can authorize the edit. Checked before any
                // entry exists: a denied edit must not start tracking the
                // pid.
                if !self.global_has(tag, polarity) {
                    debug!(%pid, %tag, %polarity, "label edit denied");
                    return Err(MonitorError::CapabilityDenied { pid, tag, polarity });
                }
                if polarity == Polarity::Negative {
                    // Removing a tag from an empty label is a no-op; the
                    // pid stays untracked.
                    return Ok(());
                }
                self.entry(pid)
            }
        };
        let mut guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
        // Lock order: per-pid entry, then global. The check is repeated
        // under the lock so a concurrent revocation cannot slip between
        // check and act.
        let authorized = guard.caps.has(tag, polarity) || self.global_has(tag, polarity);
        if !authorized {
            debug!(%pid, %tag, %polarity, "label edit denied");
            return Err(MonitorError::CapabilityDenied { pid, tag, polarity });
        }
        match polarity {
            Polarity::Positive => {
                if !guard.label.contains(tag) && guard.label.len() >= MAX_LABEL_TAGS {
                    warn!(%pid, %tag, "label at capacity, refusing taint");
                    return Err(MonitorError::LabelFull {
                        pid,
                        limit: MAX_LABEL_TAGS,
                    });
                }
                guard.label.insert(tag);
            }
            Polarity::Negative => guard.label.remove(tag),
        }
        debug!(%pid, %tag, %polarity, "label edited");
        Ok(())
    }

    /// Host notification that a process has exited: reclaims its label and
    /// capability entries. A later initialization for the same pid value is
    /// a fresh one. Unknown pids are a no-op.
    pub fn process_exited(&self, pid: Pid) {
        let removed = self
            .processes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid)
            .is_some();
        if removed {
            debug!(%pid, "reclaimed security state for exited process");
        }
    }

    /// Number of pids with tracked state (including lazily created empty
    /// entries that have not been reclaimed yet).
    #[must_use]
    pub fn tracked_processes(&self) -> usize {
        self.processes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
