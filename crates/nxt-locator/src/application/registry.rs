//! ConnectionRegistry: the authoritative set of open brick connections.
//!
//! The registry owns every connection the application currently holds plus
//! the "active" selection used by brick-targeted commands.  It replaces the
//! module-level brick list a UI plugin would otherwise keep.
//!
//! # Lifecycle
//!
//! ```text
//! refresh()   ──► take the held set out (registry is now empty)
//!                 close the old set (best effort)
//!                 discover_all()
//!                 install the new set, active index = 0
//!
//! close_all() ──► close every held handle (best effort); count is unchanged
//! ```
//!
//! A refresh that is cancelled partway leaves an empty registry, never a
//! stale closed set, and the handles it was holding are closed.
//!
//! Cleanup never propagates failures.  Instead it returns a
//! [`CleanupReport`] listing what went wrong, after logging each failure.
//!
//! # Indexing
//!
//! External indices (from the UI) are 1-based; internally the active index is
//! 0-based.  An out-of-range index never changes the current selection.

use std::sync::Arc;

use nxt_core::{BrickError, DiscoveryMethod, MotorPort, SearchFilter};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::handle::{BrickHandle, CloseOnDrop, ConnectionId};
use super::locator::Locator;

/// Error type for registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A brick-targeted operation was requested while no brick is held.
    #[error("no brick connected")]
    NoBrick,
    /// A 1-based brick index outside `1..=count`.
    #[error("brick {index} not found ({count} connected)")]
    IndexOutOfRange { index: i64, count: usize },
    /// Another refresh is already running.
    #[error("brick discovery already in progress")]
    DiscoveryInProgress,
}

/// Per-connection failures collected by a best-effort cleanup.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Number of handles the operation was attempted on.
    pub attempted: usize,
    pub failures: Vec<(ConnectionId, BrickError)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered set of open connections plus the active selection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Arc<BrickHandle>>,
    active_index: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes every held connection, runs a fresh discovery pass, installs
    /// its result and resets the selection to the first brick.
    ///
    /// Returns the number of bricks now held.
    pub async fn refresh(
        &mut self,
        locator: &Locator,
        method: &DiscoveryMethod,
        filter: &SearchFilter,
    ) -> usize {
        let previous = CloseOnDrop::new(std::mem::take(&mut self.connections));
        self.active_index = 0;

        let report = close_handles(previous.as_slice()).await;
        if !report.is_clean() {
            debug!(
                "{} of {} previous connection(s) did not close cleanly",
                report.failures.len(),
                report.attempted
            );
        }
        drop(previous);

        let found = locator.discover_all(method, filter).await;
        self.install(found);
        info!("registry refreshed: {} brick(s)", self.connections.len());
        self.connections.len()
    }

    /// Replaces the held set without closing it and resets the selection.
    ///
    /// The held set must already be closed (or empty).
    pub(crate) fn install(&mut self, handles: Vec<BrickHandle>) {
        debug_assert!(self.connections.iter().all(|h| h.is_closed()));
        self.connections = handles.into_iter().map(Arc::new).collect();
        self.active_index = 0;
    }

    /// Selects the brick at 1-based `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IndexOutOfRange`] (and leaves the selection
    /// untouched) unless `1 <= index <= count()`.
    pub fn select(&mut self, index: i64) -> Result<(), RegistryError> {
        let position = self.position(index)?;
        self.active_index = position;
        debug!("active brick is now #{index}");
        Ok(())
    }

    /// The currently selected connection.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoBrick`] when the registry is empty.
    pub fn active(&self) -> Result<Arc<BrickHandle>, RegistryError> {
        self.connections
            .get(self.active_index)
            .cloned()
            .ok_or(RegistryError::NoBrick)
    }

    /// 0-based active index, or `None` when empty.
    pub fn active_index(&self) -> Option<usize> {
        (!self.connections.is_empty()).then_some(self.active_index)
    }

    /// The connection at 1-based `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IndexOutOfRange`] for an invalid index.
    pub fn get(&self, index: i64) -> Result<Arc<BrickHandle>, RegistryError> {
        let position = self.position(index)?;
        Ok(Arc::clone(&self.connections[position]))
    }

    /// All held connections in discovery order.
    pub fn all(&self) -> &[Arc<BrickHandle>] {
        &self.connections
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Best-effort close of every held connection.
    ///
    /// Already-closed handles are skipped, so calling this twice is harmless.
    /// The handles stay in the registry (in CLOSED state) until the next
    /// refresh.
    pub async fn close_all(&self) -> CleanupReport {
        close_handles(&self.connections).await
    }

    /// Best-effort idle of motor ports A, B and C on every held connection.
    ///
    /// Stops at the first failing port of a brick and moves on to the next
    /// brick.
    pub async fn idle_motors(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for handle in &self.connections {
            report.attempted += 1;
            if let Err(e) = idle_all_ports(handle).await {
                warn!("failed to idle motors on brick {}: {e}", handle.id());
                report.failures.push((handle.id(), e));
            }
        }
        report
    }

    fn position(&self, index: i64) -> Result<usize, RegistryError> {
        let count = self.connections.len();
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .filter(|i| *i < count)
            .ok_or(RegistryError::IndexOutOfRange { index, count })
    }
}

async fn close_handles(handles: &[Arc<BrickHandle>]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for handle in handles {
        if handle.is_closed() {
            continue;
        }
        report.attempted += 1;
        if let Err(e) = handle.close().await {
            warn!("failed to close brick {}: {e}", handle.id());
            report.failures.push((handle.id(), e));
        }
    }
    report
}

async fn idle_all_ports(handle: &BrickHandle) -> Result<(), BrickError> {
    let mut connection = handle.connection().await?;
    for port in MotorPort::ALL {
        connection.idle_motor(port).await?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use nxt_core::BackendKind;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::application::test_support::{conn_named, MockConn, Script, ScriptedBackend};

    fn handle(name: &str) -> BrickHandle {
        BrickHandle::new(BackendKind::Usb, name, Box::new(conn_named(name)))
    }

    fn registry_with(names: &[&str]) -> ConnectionRegistry {
        let mut registry = ConnectionRegistry::new();
        registry.install(names.iter().map(|n| handle(n)).collect());
        registry
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.active_index(), None);
        assert_eq!(registry.active().unwrap_err(), RegistryError::NoBrick);
    }

    #[test]
    fn test_select_is_one_based() {
        // Arrange
        let mut registry = registry_with(&["first", "second"]);

        // Act
        assert_ok!(registry.select(2));

        // Assert
        assert_eq!(registry.active_index(), Some(1));
        assert_eq!(registry.active().unwrap().origin(), "second");
    }

    #[test]
    fn test_select_out_of_range_keeps_selection() {
        let mut registry = registry_with(&["first", "second"]);
        registry.select(2).unwrap();

        for bad in [0, 3, -1, i64::MIN, i64::MAX] {
            let err = assert_err!(registry.select(bad));
            assert_eq!(err, RegistryError::IndexOutOfRange { index: bad, count: 2 });
            assert_eq!(registry.active_index(), Some(1));
        }
    }

    #[test]
    fn test_select_on_empty_registry_fails() {
        let mut registry = ConnectionRegistry::new();
        assert_eq!(
            registry.select(1),
            Err(RegistryError::IndexOutOfRange { index: 1, count: 0 })
        );
    }

    #[test]
    fn test_get_returns_one_based_entry() {
        let registry = registry_with(&["first", "second", "third"]);
        assert_eq!(registry.get(3).unwrap().origin(), "third");
        assert!(registry.get(4).is_err());
    }

    #[tokio::test]
    async fn test_install_resets_active_index() {
        let mut registry = registry_with(&["first", "second"]);
        registry.select(2).unwrap();
        registry.close_all().await;

        registry.install(vec![handle("new")]);

        assert_eq!(registry.active_index(), Some(0));
        assert_eq!(registry.active().unwrap().origin(), "new");
    }

    #[tokio::test]
    async fn test_close_all_keeps_count_and_closes_every_handle() {
        // Arrange
        let registry = registry_with(&["first", "second"]);
        let held: Vec<_> = registry.all().to_vec();

        // Act
        let report = registry.close_all().await;

        // Assert
        assert!(report.is_clean());
        assert_eq!(report.attempted, 2);
        assert_eq!(registry.count(), 2);
        for handle in held {
            assert!(handle.is_closed());
            assert_eq!(handle.device_info().await.unwrap_err(), BrickError::Closed);
        }
    }

    #[tokio::test]
    async fn test_close_all_twice_is_harmless() {
        let registry = registry_with(&["first"]);

        registry.close_all().await;
        let second = registry.close_all().await;

        assert!(second.is_clean());
        assert_eq!(second.attempted, 0);
    }

    #[tokio::test]
    async fn test_close_all_on_empty_registry_is_clean() {
        let report = ConnectionRegistry::new().close_all().await;
        assert_eq!(report, CleanupReport::default());
    }

    #[tokio::test]
    async fn test_close_all_collects_failures_and_continues() {
        // Arrange
        let mut broken = MockConn::new();
        broken
            .expect_close()
            .times(1)
            .returning(|| Err(BrickError::Io("usb reset".to_string())));
        let mut registry = ConnectionRegistry::new();
        registry.install(vec![
            BrickHandle::new(BackendKind::Usb, "broken", Box::new(broken)),
            handle("healthy"),
        ]);

        // Act
        let report = registry.close_all().await;

        // Assert
        assert_eq!(report.attempted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].1, BrickError::Io("usb reset".to_string()));
        assert!(registry.all().iter().all(|h| h.is_closed()));
    }

    #[tokio::test]
    async fn test_idle_motors_idles_every_port() {
        // Arrange
        let mut conn = MockConn::new();
        for port in MotorPort::ALL {
            conn.expect_idle_motor()
                .with(eq(port))
                .times(1)
                .returning(|_| Ok(()));
        }
        let mut registry = ConnectionRegistry::new();
        registry.install(vec![BrickHandle::new(BackendKind::Usb, "one", Box::new(conn))]);

        // Act
        let report = registry.idle_motors().await;

        // Assert
        assert!(report.is_clean());
        assert_eq!(report.attempted, 1);
    }

    #[tokio::test]
    async fn test_idle_motors_reports_failure_and_moves_to_next_brick() {
        let mut failing = MockConn::new();
        failing
            .expect_idle_motor()
            .returning(|_| Err(BrickError::Io("stalled".to_string())));
        let mut healthy = MockConn::new();
        healthy.expect_idle_motor().times(3).returning(|_| Ok(()));
        let mut registry = ConnectionRegistry::new();
        registry.install(vec![
            BrickHandle::new(BackendKind::Usb, "failing", Box::new(failing)),
            BrickHandle::new(BackendKind::Usb, "healthy", Box::new(healthy)),
        ]);

        let report = registry.idle_motors().await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_idle_motors_on_closed_handles_reports_closed() {
        let registry = registry_with(&["first"]);
        registry.close_all().await;

        let report = registry.idle_motors().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].1, BrickError::Closed);
    }

    #[tokio::test]
    async fn test_refresh_closes_old_set_and_installs_new_one() {
        // Arrange
        let mut registry = registry_with(&["stale-1", "stale-2"]);
        registry.select(2).unwrap();
        let stale: Vec<_> = registry.all().to_vec();
        let locator = Locator::builder()
            .backend(ScriptedBackend::new(
                BackendKind::Usb,
                vec![Script::Opens(conn_named("fresh")), Script::Refuses],
            ))
            .build();

        // Act
        let count = registry
            .refresh(&locator, &DiscoveryMethod::default(), &SearchFilter::any())
            .await;

        // Assert
        assert_eq!(count, 1);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.active_index(), Some(0));
        assert!(stale.iter().all(|h| h.is_closed()));
        assert!(!registry.active().unwrap().is_closed());
    }
}
