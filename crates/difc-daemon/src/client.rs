//! Typed client shim for the monitor's socket surface.
//!
//! One [`MonitorClient`] wraps one connection to either socket; which
//! operations the daemon will accept depends on which socket the client
//! connected to. An unreachable or dropped transport surfaces as
//! [`ClientError::TransportUnavailable`] — a failure kind of its own, so an
//! unreachable monitor can never be mistaken for "process has no label".

use std::io;
use std::path::{Path, PathBuf};

use difc_core::wire::{CapabilityEditRequest, Request, Response, StatusCode, WireError};
use difc_core::{CapabilityEdit, Pid, Polarity, ProcessSecurityContext, Tag};
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

use crate::protocol::{ProtocolError, read_frame, write_frame};

/// Client-side failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The monitor could not be reached, or the connection died mid-call.
    #[error("monitor transport unavailable at {path}")]
    TransportUnavailable {
        /// The socket path involved.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The daemon's response could not be decoded.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The daemon answered with a failure status.
    #[error("monitor refused the operation: {status:?}")]
    Remote {
        /// The status the daemon returned.
        status: StatusCode,
    },

    /// The daemon answered with a response shape the operation does not
    /// produce.
    #[error("unexpected response shape for this operation")]
    UnexpectedResponse,
}

/// A connection to the monitor daemon.
#[derive(Debug)]
pub struct MonitorClient {
    stream: UnixStream,
    path: PathBuf,
}

impl MonitorClient {
    /// Connects to the daemon socket at `path`.
    ///
    /// # Errors
    ///
    /// [`ClientError::TransportUnavailable`] if the socket cannot be
    /// reached.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|source| ClientError::TransportUnavailable {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "connected to monitor");
        Ok(Self { stream, path })
    }

    fn transport_error(&self, error: ProtocolError) -> ClientError {
        let source = match error {
            ProtocolError::Io(source) => source,
            other => io::Error::other(other),
        };
        ClientError::TransportUnavailable {
            path: self.path.clone(),
            source,
        }
    }

    async fn call(&mut self, request: &Request) -> Result<Response, ClientError> {
        if let Err(e) = write_frame(&mut self.stream, &request.encode()).await {
            return Err(self.transport_error(e));
        }
        let frame = match read_frame(&mut self.stream).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Err(ClientError::TransportUnavailable {
                    path: self.path.clone(),
                    source: io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "daemon closed connection",
                    ),
                });
            }
            Err(e) => return Err(self.transport_error(e)),
        };
        Ok(Response::decode(&frame[..])?)
    }

    async fn call_status(&mut self, request: &Request) -> Result<(), ClientError> {
        match self.call(request).await? {
            Response::Status(StatusCode::Ok) => Ok(()),
            Response::Status(status) => Err(ClientError::Remote { status }),
            Response::Label(_) => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Fetches a process's label. Untracked processes yield an empty
    /// vector, indistinguishable from an empty label.
    ///
    /// # Errors
    ///
    /// Transport or decode failures; the query itself cannot fail.
    pub async fn process_label(&mut self, pid: Pid) -> Result<Vec<Tag>, ClientError> {
        match self.call(&Request::GetProcessLabel { pid }).await? {
            Response::Label(tags) => Ok(tags),
            Response::Status(status) => Err(ClientError::Remote { status }),
        }
    }

    /// Installs a new process security context (control socket only).
    ///
    /// # Errors
    ///
    /// [`ClientError::Remote`] with [`StatusCode::AlreadyInitialized`] for
    /// a live pid, plus the usual transport failures.
    pub async fn init_process_context(
        &mut self,
        ctx: ProcessSecurityContext,
    ) -> Result<(), ClientError> {
        self.call_status(&Request::InitProcessSecurityContext(ctx))
            .await
    }

    /// Edits the global capability set (control socket only). A `None`
    /// polarity or edit is a no-op success, preserving the legacy zero-axis
    /// semantics.
    ///
    /// # Errors
    ///
    /// Transport failures or a remote refusal.
    pub async fn add_global_cap(
        &mut self,
        tag: Tag,
        polarity: Option<Polarity>,
        edit: CapabilityEdit,
    ) -> Result<(), ClientError> {
        self.call_status(&Request::AddGlobalCap(CapabilityEditRequest {
            tag,
            polarity,
            edit,
        }))
        .await
    }

    /// Edits a process capability set (control socket only).
    ///
    /// # Errors
    ///
    /// Transport failures or a remote refusal.
    pub async fn add_process_cap(
        &mut self,
        pid: Pid,
        tag: Tag,
        polarity: Option<Polarity>,
        edit: CapabilityEdit,
    ) -> Result<(), ClientError> {
        self.call_status(&Request::AddProcessCap {
            pid,
            edit: CapabilityEditRequest {
                tag,
                polarity,
                edit,
            },
        })
        .await
    }

    /// Adds a tag to a process's label, gated by the positive capability.
    ///
    /// # Errors
    ///
    /// [`ClientError::Remote`] with [`StatusCode::CapabilityDenied`] when
    /// the right is missing, plus the usual transport failures.
    pub async fn add_tag_to_label(&mut self, pid: Pid, tag: Tag) -> Result<(), ClientError> {
        self.call_status(&Request::AddTagToLabel { pid, tag }).await
    }

    /// Notifies the monitor that a process exited (control socket only).
    ///
    /// # Errors
    ///
    /// Transport failures or a remote refusal.
    pub async fn process_exited(&mut self, pid: Pid) -> Result<(), ClientError> {
        self.call_status(&Request::ProcessExited { pid }).await
    }
}
