//! Core reference-monitor logic for decentralized information flow control
//! (DIFC).
//!
//! A monitor attaches secrecy labels (sets of opaque tags) to processes and
//! gates label mutation behind per-tag capabilities: a positive capability
//! is the right to add the tag (taint), a negative one the right to remove
//! it (declassify). This crate holds the data model and the enforcement
//! logic; hosting it behind a transport is `difc-daemon`'s job.
//!
//! # Components
//!
//! - [`tag`]: tag, pid/uid, polarity and edit types.
//! - [`capability`]: per-tag right sets (global and per-process).
//! - [`label`]: secrecy labels.
//! - [`context`]: the process security context installed at creation time.
//! - [`monitor`]: the reference monitor — validated, atomic mutation.
//! - [`registry`]: the named-tag layer for embedding hosts.
//! - [`wire`]: the fixed-shape codec with the legacy tri-state encodings.
//!
//! # Example
//!
//! ```
//! use difc_core::{
//!     CapabilityScope, Pid, Polarity, ProcessSecurityContext, ReferenceMonitor, Tag, Uid,
//! };
//!
//! let monitor = ReferenceMonitor::new();
//! monitor.init_process_context(ProcessSecurityContext {
//!     pid: Pid(100),
//!     uid: Uid(1000),
//!     sec: vec![],
//!     pos: vec![Tag(7)],
//!     neg: vec![],
//! })?;
//! monitor.add_tag_to_label(Pid(100), Tag(7))?;
//! assert!(monitor.process_label(Pid(100)).contains(Tag(7)));
//! assert!(monitor.add_tag_to_label(Pid(100), Tag(9)).is_err());
//! # Ok::<(), difc_core::MonitorError>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capability;
pub mod context;
pub mod error;
pub mod label;
pub mod monitor;
pub mod registry;
pub mod tag;
pub mod wire;

pub use capability::{CapabilityRights, CapabilitySet};
pub use context::ProcessSecurityContext;
pub use error::{MonitorError, RegistryError};
pub use label::SecurityLabel;
pub use monitor::{CapabilityScope, ReferenceMonitor};
pub use registry::{ExportDecision, Principal, TagOptions, TagRegistry};
pub use tag::{CapabilityEdit, Pid, Polarity, Tag, Uid};
