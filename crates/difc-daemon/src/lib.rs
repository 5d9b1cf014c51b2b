//! Unix-socket host for the DIFC reference monitor.
//!
//! `difc-core` holds the enforcement logic; this crate puts it behind a
//! narrow request/response surface: length-prefixed frames over two Unix
//! domain sockets. The control socket (mode 0600) carries the privileged
//! administrative operations, the query socket (mode 0660) carries label
//! queries and gated taints — which socket accepted a connection is the
//! entire privilege decision, per the host's trust model.
//!
//! [`client::MonitorClient`] is the marshaling shim for reaching a hosted
//! monitor from another process.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod protocol;
pub mod state;

pub use client::{ClientError, MonitorClient};
pub use protocol::dispatch::Dispatcher;
pub use protocol::socket_manager::{SocketManager, SocketManagerConfig};
pub use protocol::{MAX_FRAME_SIZE, ProtocolError};
pub use state::{DaemonStateHandle, SharedState};
