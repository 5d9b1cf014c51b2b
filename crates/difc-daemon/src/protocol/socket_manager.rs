//! Dual-socket manager for privilege separation.
//!
//! Two Unix domain sockets share one runtime directory:
//!
//! - **Control socket** (mode 0600, owner only): the privilege boundary for
//!   the administrative operations — context initialization, global and
//!   process capability edits, exit notifications.
//! - **Query socket** (mode 0660, owner + group): label queries and gated
//!   label taints.
//!
//! A connection's privilege is determined solely by which socket accepted
//! it, never by anything the client asserts. The monitor itself does not
//! authenticate callers; these file modes are the trust boundary.
//!
//! Socket permissions are set after binding; stale socket files are removed
//! before binding; the runtime directory is forced to mode 0700.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use difc_core::ReferenceMonitor;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, info, warn};

use super::dispatch::Dispatcher;
use super::{ProtocolError, read_frame, write_frame};

/// Default socket filenames.
const CONTROL_SOCKET_NAME: &str = "control.sock";
const QUERY_SOCKET_NAME: &str = "query.sock";

/// Control socket mode: owner only.
const CONTROL_SOCKET_MODE: u32 = 0o600;
/// Query socket mode: owner + group.
const QUERY_SOCKET_MODE: u32 = 0o660;
/// Runtime directory mode.
const DIRECTORY_MODE: u32 = 0o700;

/// Socket manager configuration.
#[derive(Debug, Clone)]
pub struct SocketManagerConfig {
    /// Directory holding both sockets.
    pub runtime_dir: PathBuf,
    /// Control socket filename within the runtime directory.
    pub control_socket_name: String,
    /// Query socket filename within the runtime directory.
    pub query_socket_name: String,
    /// Maximum concurrent connections across both sockets.
    pub max_connections: usize,
}

impl Default for SocketManagerConfig {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("/run/difcd"),
            control_socket_name: CONTROL_SOCKET_NAME.to_owned(),
            query_socket_name: QUERY_SOCKET_NAME.to_owned(),
            max_connections: 64,
        }
    }
}

/// Owns both listeners and the accept loops.
#[derive(Debug)]
pub struct SocketManager {
    control: UnixListener,
    query: UnixListener,
    control_path: PathBuf,
    query_path: PathBuf,
    dispatcher: Dispatcher,
    connection_limit: Arc<Semaphore>,
}

impl SocketManager {
    /// Prepares the runtime directory and binds both sockets.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Io`] if the directory or either socket cannot be
    /// set up.
    pub fn bind(
        config: &SocketManagerConfig,
        monitor: Arc<ReferenceMonitor>,
    ) -> Result<Self, ProtocolError> {
        std::fs::create_dir_all(&config.runtime_dir)?;
        std::fs::set_permissions(
            &config.runtime_dir,
            std::fs::Permissions::from_mode(DIRECTORY_MODE),
        )?;

        let control_path = config.runtime_dir.join(&config.control_socket_name);
        let query_path = config.runtime_dir.join(&config.query_socket_name);
        let control = bind_socket(&control_path, CONTROL_SOCKET_MODE)?;
        let query = bind_socket(&query_path, QUERY_SOCKET_MODE)?;
        info!(
            control = %control_path.display(),
            query = %query_path.display(),
            "listening"
        );

        Ok(Self {
            control,
            query,
            control_path,
            query_path,
            dispatcher: Dispatcher::new(monitor),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Path of the bound control socket.
    #[must_use]
    pub fn control_path(&self) -> &Path {
        &self.control_path
    }

    /// Path of the bound query socket.
    #[must_use]
    pub fn query_path(&self) -> &Path {
        &self.query_path
    }

    /// Accepts connections on both sockets until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.control.accept() => {
                    self.accept(accepted, true);
                }
                accepted = self.query.accept() => {
                    self.accept(accepted, false);
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown; `changed` would
                    // otherwise return `Err` on every loop turn.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested, closing listeners");
                        break;
                    }
                }
            }
        }
    }

    fn accept(
        &self,
        accepted: io::Result<(UnixStream, tokio::net::unix::SocketAddr)>,
        privileged: bool,
    ) {
        let (stream, _) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, privileged, "accept failed");
                return;
            }
        };
        let Ok(permit) = Arc::clone(&self.connection_limit).try_acquire_owned() else {
            warn!(privileged, "connection limit reached, refusing connection");
            return;
        };
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_connection(stream, &dispatcher, privileged).await {
                debug!(error = %e, privileged, "connection ended with error");
            }
            drop(permit);
        });
    }
}

fn bind_socket(path: &Path, mode: u32) -> Result<UnixListener, ProtocolError> {
    // A previous daemon instance may have left its socket file behind.
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let listener = UnixListener::bind(path)?;
    // Permissions are applied after binding so there is no window in which
    // the socket exists with default modes.
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(listener)
}

/// Serves one connection: frames in, responses out, until the peer closes.
async fn serve_connection(
    mut stream: UnixStream,
    dispatcher: &Dispatcher,
    privileged: bool,
) -> Result<(), ProtocolError> {
    while let Some(frame) = read_frame(&mut stream).await? {
        let response = dispatcher.dispatch(&frame, privileged);
        write_frame(&mut stream, &response.encode()).await?;
    }
    Ok(())
}
