use super::{LedgerClient, LedgerError};
use async_trait::async_trait;
use shared::models::{ResourceCapability, ResourceStatus, ResultAttestation};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LedgerCall {
    Register(ResourceCapability),
    Status(ResourceStatus),
    Result(ResultAttestation),
}

/// In-memory ledger that records every accepted call in order and can be
/// told to fail or stall.
#[derive(Debug, Default)]
pub(crate) struct MockLedgerClient {
    calls: Mutex<Vec<LedgerCall>>,
    status_attempts: AtomicUsize,
    status_failures_pending: AtomicUsize,
    result_attempts: AtomicUsize,
    result_failures_pending: AtomicUsize,
    fail_status: AtomicBool,
    fail_register: AtomicBool,
    fail_results: AtomicBool,
    status_delay: Mutex<Option<Duration>>,
}

impl MockLedgerClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_status_failing(&self, failing: bool) {
        self.fail_status.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_status_updates(&self, count: usize) {
        self.status_failures_pending.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_results(&self, count: usize) {
        self.result_failures_pending.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_register_failing(&self, failing: bool) {
        self.fail_register.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_results_failing(&self, failing: bool) {
        self.fail_results.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<LedgerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn statuses(&self) -> Vec<ResourceStatus> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LedgerCall::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn results(&self) -> Vec<ResultAttestation> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LedgerCall::Result(attestation) => Some(attestation),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn status_attempts(&self) -> usize {
        self.status_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn result_attempts(&self) -> usize {
        self.result_attempts.load(Ordering::SeqCst)
    }

    fn record(&self, call: LedgerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn register_resource(&self, capability: &ResourceCapability) -> Result<(), LedgerError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("registration refused".into()));
        }
        self.record(LedgerCall::Register(capability.clone()));
        Ok(())
    }

    async fn update_status(
        &self,
        _resource_id: u64,
        status: ResourceStatus,
    ) -> Result<(), LedgerError> {
        self.status_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("status update refused".into()));
        }
        let pending = self.status_failures_pending.load(Ordering::SeqCst);
        if pending > 0 {
            self.status_failures_pending
                .store(pending - 1, Ordering::SeqCst);
            return Err(LedgerError::Unavailable("transient failure".into()));
        }
        self.record(LedgerCall::Status(status));
        Ok(())
    }

    async fn submit_result(
        &self,
        _resource_id: u64,
        attestation: &ResultAttestation,
    ) -> Result<(), LedgerError> {
        self.result_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_results.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("result refused".into()));
        }
        let pending = self.result_failures_pending.load(Ordering::SeqCst);
        if pending > 0 {
            self.result_failures_pending
                .store(pending - 1, Ordering::SeqCst);
            return Err(LedgerError::Unavailable("transient failure".into()));
        }
        self.record(LedgerCall::Result(attestation.clone()));
        Ok(())
    }
}
