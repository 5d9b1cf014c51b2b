//! Request dispatch: decode a frame, run it against the monitor, encode the
//! outcome.
//!
//! Privilege is an attribute of the connection (which socket accepted it),
//! never of the request: the mutating administrative operations — context
//! initialization, capability edits, exit notifications — are refused with
//! `PermissionDenied` on unprivileged connections before the monitor is
//! consulted. Malformed frames are answered with `MalformedRequest` and
//! never reach the monitor either.

use std::sync::Arc;

use difc_core::wire::{CapabilityEditRequest, Request, Response, StatusCode};
use difc_core::{MonitorError, ReferenceMonitor};
use tracing::{debug, warn};

/// Stateless request executor over a shared monitor.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    monitor: Arc<ReferenceMonitor>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given monitor.
    #[must_use]
    pub fn new(monitor: Arc<ReferenceMonitor>) -> Self {
        Self { monitor }
    }

    /// Decodes and executes one request payload.
    ///
    /// Infallible by design: every failure mode is expressed as a response
    /// the peer can decode.
    #[must_use]
    pub fn dispatch(&self, payload: &[u8], privileged: bool) -> Response {
        let request = match Request::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "rejecting malformed request frame");
                return Response::Status(StatusCode::MalformedRequest);
            }
        };
        if request_is_privileged(&request) && !privileged {
            warn!(?request, "privileged request on unprivileged connection");
            return Response::Status(StatusCode::PermissionDenied);
        }
        self.execute(request)
    }

    fn execute(&self, request: Request) -> Response {
        debug!(?request, "dispatching");
        match request {
            Request::GetProcessLabel { pid } => {
                Response::Label(self.monitor.process_label(pid).to_vec())
            }
            Request::AddGlobalCap(CapabilityEditRequest {
                tag,
                polarity,
                edit,
            }) => {
                if let Some(polarity) = polarity {
                    self.monitor.edit_global_capability(tag, polarity, edit);
                }
                Response::Status(StatusCode::Ok)
            }
            Request::InitProcessSecurityContext(ctx) => {
                match self.monitor.init_process_context(ctx) {
                    Ok(()) => Response::Status(StatusCode::Ok),
                    Err(e) => Response::Status(status_for(&e)),
                }
            }
            Request::AddTagToLabel { pid, tag } => {
                match self.monitor.add_tag_to_label(pid, tag) {
                    Ok(()) => Response::Status(StatusCode::Ok),
                    Err(e) => Response::Status(status_for(&e)),
                }
            }
            Request::AddProcessCap {
                pid,
                edit:
                    CapabilityEditRequest {
                        tag,
                        polarity,
                        edit,
                    },
            } => {
                if let Some(polarity) = polarity {
                    self.monitor.edit_process_capability(pid, tag, polarity, edit);
                }
                Response::Status(StatusCode::Ok)
            }
            Request::ProcessExited { pid } => {
                self.monitor.process_exited(pid);
                Response::Status(StatusCode::Ok)
            }
        }
    }
}

/// Whether the operation may only arrive over the control socket.
fn request_is_privileged(request: &Request) -> bool {
    match request {
        Request::AddGlobalCap(_)
        | Request::AddProcessCap { .. }
        | Request::InitProcessSecurityContext(_)
        | Request::ProcessExited { .. } => true,
        Request::GetProcessLabel { .. } | Request::AddTagToLabel { .. } => false,
    }
}

fn status_for(error: &MonitorError) -> StatusCode {
    match error {
        MonitorError::AlreadyInitialized { .. } => StatusCode::AlreadyInitialized,
        MonitorError::CapabilityDenied { .. } => StatusCode::CapabilityDenied,
        MonitorError::UnknownProcess { .. } => StatusCode::UnknownProcess,
        MonitorError::LabelFull { .. } => StatusCode::LabelFull,
        _ => StatusCode::MalformedRequest,
    }
}
