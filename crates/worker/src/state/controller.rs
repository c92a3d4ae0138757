use crate::jobs::result::JobOutcome;
use crate::ledger::{LedgerClient, LedgerError};
use log::{debug, info};
use shared::models::{ResourceCapability, ResourceStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, thiserror::Error)]
pub(crate) enum SyncError {
    #[error("ledger sync failed: {0}")]
    Ledger(#[from] LedgerError),
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ResourceStatus,
        to: ResourceStatus,
    },
    #[error("state controller is closed")]
    Closed,
}

impl SyncError {
    /// Local faults leave the in-memory status untouched. Ledger faults
    /// happen after the in-memory status was already applied.
    pub(crate) fn is_local(&self) -> bool {
        !matches!(self, SyncError::Ledger(_))
    }
}

#[derive(Debug, Default)]
struct SyncState {
    closed: bool,
}

/// Owns the authoritative in-memory status of this resource and pushes
/// every change to the ledger.
///
/// Updates are serialized: the in-memory value and the matching ledger
/// call are applied under one lock, so the ledger observes transitions in
/// the order they were applied locally. Reads never wait on that lock.
pub(crate) struct StateController {
    resource_id: u64,
    ledger: Arc<dyn LedgerClient>,
    status: watch::Sender<ResourceStatus>,
    sync: Mutex<SyncState>,
    ledger_reachable: AtomicBool,
}

impl StateController {
    pub(crate) fn new(resource_id: u64, ledger: Arc<dyn LedgerClient>) -> Self {
        let (status, _) = watch::channel(ResourceStatus::Idle);
        Self {
            resource_id,
            ledger,
            status,
            sync: Mutex::new(SyncState::default()),
            ledger_reachable: AtomicBool::new(false),
        }
    }

    pub(crate) fn get_status(&self) -> ResourceStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every locally applied status.
    #[cfg(test)]
    pub(crate) fn subscribe(&self) -> watch::Receiver<ResourceStatus> {
        self.status.subscribe()
    }

    /// Whether the most recent ledger status sync succeeded.
    pub(crate) fn ledger_reachable(&self) -> bool {
        self.ledger_reachable.load(Ordering::Relaxed)
    }

    /// Applies `status` locally, then reports it to the ledger.
    ///
    /// A ledger failure does not roll the local value back: the next
    /// heartbeat re-asserts it.
    pub(crate) async fn set_status(&self, status: ResourceStatus) -> Result<(), SyncError> {
        let sync = self.sync.lock().await;
        if sync.closed {
            return Err(SyncError::Closed);
        }
        let current = self.get_status();
        check_transition(current, status)?;
        self.apply(status).await
    }

    /// Re-sends whatever status is current when the lock is acquired.
    pub(crate) async fn reassert(&self) -> Result<ResourceStatus, SyncError> {
        let sync = self.sync.lock().await;
        if sync.closed {
            return Err(SyncError::Closed);
        }
        let current = self.get_status();
        self.apply(current).await?;
        Ok(current)
    }

    /// Final transition to Offline. Any later `set_status` is refused so a
    /// job finishing during shutdown cannot overwrite it.
    pub(crate) async fn shutdown(&self) -> Result<(), SyncError> {
        let mut sync = self.sync.lock().await;
        if sync.closed {
            return Err(SyncError::Closed);
        }
        sync.closed = true;
        info!("Reporting resource {} as Offline", self.resource_id);
        self.apply(ResourceStatus::Offline).await
    }

    /// Registers the resource record. Called once at startup; the ledger
    /// treats a repeated identical registration as a no-op.
    pub(crate) async fn register_once(
        &self,
        capability: &ResourceCapability,
    ) -> Result<(), SyncError> {
        self.ledger.register_resource(capability).await?;
        info!(
            "Registered resource {} ({}, rating {})",
            capability.resource_id, capability.gpu_model, capability.compute_rating
        );
        Ok(())
    }

    /// Submits the attestation for a finished job. Does not take the status
    /// lock.
    pub(crate) async fn report_outcome(&self, outcome: &JobOutcome) -> Result<(), SyncError> {
        let attestation = outcome.attestation();
        self.ledger
            .submit_result(self.resource_id, &attestation)
            .await?;
        debug!(
            "Result attestation for job {} accepted by ledger",
            outcome.job_id
        );
        Ok(())
    }

    async fn apply(&self, status: ResourceStatus) -> Result<(), SyncError> {
        self.status.send_replace(status);
        match self.ledger.update_status(self.resource_id, status).await {
            Ok(()) => {
                self.ledger_reachable.store(true, Ordering::Relaxed);
                debug!("Ledger status for resource {} is {status}", self.resource_id);
                Ok(())
            }
            Err(e) => {
                self.ledger_reachable.store(false, Ordering::Relaxed);
                debug!("Status {status} applied locally but ledger sync failed: {e}");
                Err(SyncError::Ledger(e))
            }
        }
    }
}

/// A resource taken out of rotation cannot pick up work.
fn check_transition(from: ResourceStatus, to: ResourceStatus) -> Result<(), SyncError> {
    match (from, to) {
        (ResourceStatus::Offline | ResourceStatus::Suspended, ResourceStatus::Busy) => {
            Err(SyncError::InvalidTransition { from, to })
        }
        _ => Ok(()),
    }
}
