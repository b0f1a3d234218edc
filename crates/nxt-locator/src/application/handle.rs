//! BrickHandle: the lifecycle wrapper around one open brick connection.
//!
//! Backends produce raw [`BrickConnection`]s.  The locator immediately wraps
//! each one in a [`BrickHandle`], which:
//!
//! - gives the connection a stable [`ConnectionId`] for logs and snapshots;
//! - remembers which backend and candidate it came from;
//! - enforces the per-connection state machine regardless of how carefully
//!   the backend implements it.
//!
//! # State machine
//!
//! ```text
//! OPEN ──close()──► CLOSED
//! ```
//!
//! CLOSED is absorbing.  Every operation on a closed handle fails with
//! [`BrickError::Closed`], including a second `close()`.  The handle is marked
//! closed *before* the transport close runs, so a transport that fails to
//! close cleanly still cannot be reused.
//!
//! # Cancellation
//!
//! Discovery and refresh hold freshly opened handles across `.await` points.
//! They keep them in a [`CloseOnDrop`] set so that a caller dropping the
//! future midway (e.g. through `tokio::time::timeout`) does not leave bricks
//! open and busy.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use nxt_core::{BackendKind, BrickConnection, BrickError, DeviceInfo};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies one connection for the lifetime of the process.
pub type ConnectionId = Uuid;

/// An open (or formerly open) connection to one brick.
pub struct BrickHandle {
    id: ConnectionId,
    backend: BackendKind,
    origin: String,
    closed: AtomicBool,
    connection: Mutex<Box<dyn BrickConnection>>,
}

impl BrickHandle {
    /// Wraps a freshly opened connection.
    pub fn new(
        backend: BackendKind,
        origin: impl Into<String>,
        connection: Box<dyn BrickConnection>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            backend,
            origin: origin.into(),
            closed: AtomicBool::new(false),
            connection: Mutex::new(connection),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Backend that produced this connection.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Description of the candidate this connection was opened from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Locks the underlying connection for a command exchange.
    ///
    /// # Errors
    ///
    /// Returns [`BrickError::Closed`] once the handle has been closed.
    pub async fn connection(&self) -> Result<MutexGuard<'_, Box<dyn BrickConnection>>, BrickError> {
        let guard = self.connection.lock().await;
        if self.is_closed() {
            return Err(BrickError::Closed);
        }
        Ok(guard)
    }

    /// Queries the brick's identity.
    pub async fn device_info(&self) -> Result<DeviceInfo, BrickError> {
        self.connection().await?.device_info().await
    }

    /// Closes the connection.  The handle is CLOSED afterwards even if the
    /// transport reports an error.
    ///
    /// # Errors
    ///
    /// Returns [`BrickError::Closed`] if already closed, or the transport's
    /// own close error.
    pub async fn close(&self) -> Result<(), BrickError> {
        let mut guard = self.connection.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(BrickError::Closed);
        }
        guard.close().await
    }
}

impl fmt::Debug for BrickHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrickHandle")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .field("origin", &self.origin)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AsRef<BrickHandle> for BrickHandle {
    fn as_ref(&self) -> &BrickHandle {
        self
    }
}

/// Handles owned by an in-flight pass.
///
/// Whatever is still open when the set is dropped gets closed on a task
/// spawned onto the current runtime.  [`into_inner`](Self::into_inner) hands
/// the handles over and disarms the set.
pub(crate) struct CloseOnDrop<H>
where
    H: AsRef<BrickHandle> + Send + Sync + 'static,
{
    handles: Vec<H>,
}

impl<H> CloseOnDrop<H>
where
    H: AsRef<BrickHandle> + Send + Sync + 'static,
{
    pub(crate) fn new(handles: Vec<H>) -> Self {
        Self { handles }
    }

    pub(crate) fn push(&mut self, handle: H) {
        self.handles.push(handle);
    }

    pub(crate) fn pop(&mut self) -> Option<H> {
        self.handles.pop()
    }

    pub(crate) fn last(&self) -> Option<&H> {
        self.handles.last()
    }

    pub(crate) fn as_slice(&self) -> &[H] {
        &self.handles
    }

    pub(crate) fn into_inner(mut self) -> Vec<H> {
        std::mem::take(&mut self.handles)
    }
}

impl<H> Drop for CloseOnDrop<H>
where
    H: AsRef<BrickHandle> + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let open: Vec<H> = self
            .handles
            .drain(..)
            .filter(|h| !h.as_ref().is_closed())
            .collect();
        if open.is_empty() {
            return;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                debug!("closing {} brick(s) left open by an interrupted pass", open.len());
                runtime.spawn(async move {
                    for handle in open {
                        let handle = handle.as_ref();
                        if let Err(e) = handle.close().await {
                            warn!("failed to close abandoned brick {}: {e}", handle.id());
                        }
                    }
                });
            }
            Err(_) => warn!(
                "{} brick(s) dropped while open outside a tokio runtime",
                open.len()
            ),
        }
    }
}
