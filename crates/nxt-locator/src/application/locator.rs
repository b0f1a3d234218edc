//! Locator: one discovery pass across the enabled transport backends.
//!
//! The locator is the heart of brick discovery.  For each backend enabled in
//! the [`DiscoveryMethod`] it enumerates candidates, tries to connect each
//! one, optionally checks the connected brick's identity, and returns every
//! connection that survived.
//!
//! # Failure isolation
//!
//! Hardware may or may not be present at any moment, so nothing found is
//! never an error:
//!
//! ```text
//! backend enumerate fails / times out  ──► warn!, skip backend
//! candidate connect fails / times out  ──► debug!, skip candidate
//! strict identity mismatch             ──► info!, close, skip brick
//! ```
//!
//! # Ordering
//!
//! Backends are queried in [`BackendKind::ALL`] order and candidates are
//! connected one after another, so for a fixed set of backends and
//! candidates the result order is deterministic.

use std::collections::BTreeMap;
use std::time::Duration;

use nxt_core::{
    BackendError, BackendKind, BrickError, Candidate, ConnectError, DiscoveryMethod,
    IdentityMismatch, SearchFilter, TransportBackend,
};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::handle::{BrickHandle, CloseOnDrop};

/// Default upper bound for one backend's enumeration.
pub const DEFAULT_ENUMERATE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default upper bound for one candidate's connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadlines applied during a discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorConfig {
    pub enumerate_timeout: Duration,
    /// Also bounds the identity query in strict mode.
    pub connect_timeout: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            enumerate_timeout: DEFAULT_ENUMERATE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Why a connected brick was dropped by strict filtering.
#[derive(Debug, Error)]
enum Rejection {
    #[error(transparent)]
    Mismatch(#[from] IdentityMismatch),
    #[error("identity query failed: {0}")]
    Query(#[from] BrickError),
    #[error("identity query timed out after {0:?}")]
    TimedOut(Duration),
}

/// Finds and opens bricks across a fixed set of backends.
///
/// Holds no per-pass state; one locator can serve any number of passes.
pub struct Locator {
    backends: BTreeMap<BackendKind, Box<dyn TransportBackend>>,
    config: LocatorConfig,
}

impl Locator {
    pub fn builder() -> LocatorBuilder {
        LocatorBuilder::default()
    }

    pub fn config(&self) -> LocatorConfig {
        self.config
    }

    /// Returns `true` if a backend of `kind` was registered.
    pub fn has_backend(&self, kind: BackendKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// Registered backends in discovery order.
    pub fn backend_kinds(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.backends.keys().copied()
    }

    /// Runs one discovery pass and returns every surviving connection in
    /// discovery order.  An empty result is normal.
    pub async fn discover_all(
        &self,
        method: &DiscoveryMethod,
        filter: &SearchFilter,
    ) -> Vec<BrickHandle> {
        let mut found = CloseOnDrop::new(Vec::new());

        for kind in method.enabled() {
            let Some(backend) = self.backends.get(&kind) else {
                warn!("{kind} discovery requested but no {kind} backend is registered");
                continue;
            };

            let candidates = match self.enumerate(kind, backend.as_ref(), filter).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("skipping {kind} backend: {e}");
                    continue;
                }
            };
            debug!("{kind} backend returned {} candidate(s)", candidates.len());

            for candidate in candidates {
                self.open(kind, candidate, filter, &mut found).await;
            }
        }

        let found = found.into_inner();
        info!("discovery found {} brick(s) using [{method}]", found.len());
        found
    }

    /// Returns the first brick [`discover_all`](Self::discover_all) finds.
    ///
    /// Every other surviving connection is closed before returning.
    pub async fn discover_one(
        &self,
        method: &DiscoveryMethod,
        filter: &SearchFilter,
    ) -> Option<BrickHandle> {
        let found = CloseOnDrop::new(self.discover_all(method, filter).await);
        for extra in found.as_slice().iter().skip(1) {
            if let Err(e) = extra.close().await {
                warn!("failed to close surplus brick {}: {e}", extra.id());
            }
        }
        found.into_inner().into_iter().next()
    }

    async fn enumerate(
        &self,
        kind: BackendKind,
        backend: &dyn TransportBackend,
        filter: &SearchFilter,
    ) -> Result<Vec<Box<dyn Candidate>>, BackendError> {
        let after = self.config.enumerate_timeout;
        timeout(after, backend.enumerate(filter))
            .await
            .unwrap_or(Err(BackendError::TimedOut {
                backend: kind,
                after,
            }))
    }

    /// Connects one candidate, applies strict filtering and adds the
    /// survivor to `found`.
    async fn open(
        &self,
        kind: BackendKind,
        candidate: Box<dyn Candidate>,
        filter: &SearchFilter,
        found: &mut CloseOnDrop<BrickHandle>,
    ) {
        let label = candidate.describe();
        let after = self.config.connect_timeout;

        let connected = timeout(after, candidate.connect())
            .await
            .unwrap_or_else(|_| {
                Err(ConnectError::TimedOut {
                    candidate: label.clone(),
                    after,
                })
            });
        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                debug!("discarding candidate: {e}");
                return;
            }
        };

        // Held in `found` from here on, so an interrupted identity query
        // still gets the brick closed.
        found.push(BrickHandle::new(kind, label, connection));
        let Some(handle) = found.last() else {
            return;
        };

        if filter.requires_identity_check() {
            if let Err(reason) = self.verify_identity(handle, filter).await {
                info!("rejecting brick from {}: {reason}", handle.origin());
                if let Err(e) = handle.close().await {
                    warn!("failed to close rejected brick {}: {e}", handle.id());
                }
                found.pop();
                return;
            }
        }

        debug!(
            "opened brick {} via {} ({})",
            handle.id(),
            kind,
            handle.origin()
        );
    }

    async fn verify_identity(
        &self,
        handle: &BrickHandle,
        filter: &SearchFilter,
    ) -> Result<(), Rejection> {
        let after = self.config.connect_timeout;
        let info = timeout(after, handle.device_info())
            .await
            .map_err(|_| Rejection::TimedOut(after))??;
        filter.check_identity(&info)?;
        Ok(())
    }
}

/// Builder for [`Locator`].
#[derive(Default)]
pub struct LocatorBuilder {
    backends: BTreeMap<BackendKind, Box<dyn TransportBackend>>,
    config: LocatorConfig,
}

impl LocatorBuilder {
    /// Registers a backend under its own [`TransportBackend::kind`].
    ///
    /// Registering a second backend of the same kind replaces the first.
    pub fn backend(self, backend: impl TransportBackend + 'static) -> Self {
        self.boxed_backend(Box::new(backend))
    }

    pub fn boxed_backend(mut self, backend: Box<dyn TransportBackend>) -> Self {
        let kind = backend.kind();
        if self.backends.insert(kind, backend).is_some() {
            warn!("replacing previously registered {kind} backend");
        }
        self
    }

    pub fn enumerate_timeout(mut self, after: Duration) -> Self {
        self.config.enumerate_timeout = after;
        self
    }

    pub fn connect_timeout(mut self, after: Duration) -> Self {
        self.config.connect_timeout = after;
        self
    }

    pub fn build(self) -> Locator {
        Locator {
            backends: self.backends,
            config: self.config,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
