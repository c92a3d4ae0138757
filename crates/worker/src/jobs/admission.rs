use super::result::{is_valid, JobOutcome};
use super::runner::{WorkloadFailure, WorkloadRunner};
use crate::state::{StateController, SyncError};
use log::{debug, error, info, warn};
use shared::models::{JobSpec, ResourceStatus};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

const OUTCOME_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub(crate) enum AdmissionError {
    #[error("job {running} is already running")]
    AlreadyRunning { running: String },
    #[error("failed to mark resource busy: {0}")]
    Status(SyncError),
    #[error("job {0} was dropped before it started")]
    Interrupted(String),
}

/// Holds the id of the job occupying this resource, if any.
#[derive(Debug, Default)]
struct JobSlot {
    current: Mutex<Option<String>>,
}

impl JobSlot {
    /// Claims the slot without waiting. On contention returns the id of the
    /// job that holds it.
    fn try_claim(self: &Arc<Self>, job_id: &str) -> Result<SlotGuard, String> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(running) = current.as_ref() {
            return Err(running.clone());
        }
        *current = Some(job_id.to_string());
        Ok(SlotGuard { slot: self.clone() })
    }

    fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

struct SlotGuard {
    slot: Arc<JobSlot>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        *self
            .slot
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

/// Owned by a running job from the moment it is marked Busy. Restores Idle
/// exactly once, then frees the slot.
struct BusyGuard {
    job_id: String,
    state: Arc<StateController>,
    slot: Option<SlotGuard>,
}

impl BusyGuard {
    async fn release(mut self) {
        let slot = self.slot.take();
        restore_idle(&self.state, &self.job_id).await;
        drop(slot);
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        // The execution task was torn down before it could finalize.
        let state = self.state.clone();
        let job_id = std::mem::take(&mut self.job_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    restore_idle(&state, &job_id).await;
                    drop(slot);
                });
            }
            Err(_) => error!("Job {job_id} dropped outside a runtime; Idle was not restored"),
        }
    }
}

async fn restore_idle(state: &StateController, job_id: &str) {
    match state.set_status(ResourceStatus::Idle).await {
        Ok(()) => debug!("Resource back to Idle after job {job_id}"),
        Err(e) if e.is_local() => warn!("Not restoring Idle after job {job_id}: {e}"),
        Err(e) => error!("Idle restored locally after job {job_id} but not synced: {e}"),
    }
}

/// Admits at most one job at a time and drives it to an outcome.
pub(crate) struct JobAdmission {
    state: Arc<StateController>,
    runner: Arc<dyn WorkloadRunner>,
    slot: Arc<JobSlot>,
    outcomes: broadcast::Sender<JobOutcome>,
    cancellation_token: CancellationToken,
}

impl JobAdmission {
    pub(crate) fn new(
        state: Arc<StateController>,
        runner: Arc<dyn WorkloadRunner>,
        cancellation_token: CancellationToken,
    ) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            state,
            runner,
            slot: Arc::new(JobSlot::default()),
            outcomes,
            cancellation_token,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.slot.current().is_some()
    }

    pub(crate) fn current_job(&self) -> Option<String> {
        self.slot.current()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<JobOutcome> {
        self.outcomes.subscribe()
    }

    /// Accepts `job` if the resource is free, marks it Busy and starts it in
    /// the background. Returns as soon as the job is started.
    ///
    /// A ledger failure while announcing Busy does not refuse the job: the
    /// resource is Busy locally and the heartbeat re-asserts it.
    ///
    /// Once the slot is claimed the Busy transition and the run belong to a
    /// spawned task, so dropping this future never strands a Busy status.
    pub(crate) async fn submit(&self, job: JobSpec) -> Result<(), AdmissionError> {
        let slot = self
            .slot
            .try_claim(&job.job_id)
            .map_err(|running| AdmissionError::AlreadyRunning { running })?;

        let job_id = job.job_id.clone();
        let state = self.state.clone();
        let runner_name = self.runner.name();
        let execution = Execution {
            state: self.state.clone(),
            runner: self.runner.clone(),
            outcomes: self.outcomes.clone(),
            cancel: self.cancellation_token.child_token(),
        };
        let (admitted_tx, admitted_rx) = oneshot::channel();

        tokio::spawn(async move {
            match state.set_status(ResourceStatus::Busy).await {
                Ok(()) => {}
                Err(e) if e.is_local() => {
                    drop(slot);
                    let _ = admitted_tx.send(Err(AdmissionError::Status(e)));
                    return;
                }
                Err(e) => warn!("Job {} admitted but Busy was not synced: {e}", job.job_id),
            }

            let guard = BusyGuard {
                job_id: job.job_id.clone(),
                state,
                slot: Some(slot),
            };
            info!(
                "Job {} admitted ({runner_name} runner, timeout {}s)",
                job.job_id, job.timeout_secs
            );
            // The submitter may have gone away; the job runs regardless.
            let _ = admitted_tx.send(Ok(()));
            execution.run(job, guard).await;
        });

        admitted_rx
            .await
            .unwrap_or(Err(AdmissionError::Interrupted(job_id)))
    }

    /// Waits until no job occupies the slot, up to `timeout`.
    pub(crate) async fn wait_idle(&self, timeout: Duration) -> bool {
        let poll = async {
            while self.is_running() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }
}

struct Execution {
    state: Arc<StateController>,
    runner: Arc<dyn WorkloadRunner>,
    outcomes: broadcast::Sender<JobOutcome>,
    cancel: CancellationToken,
}

impl Execution {
    async fn run(self, job: JobSpec, guard: BusyGuard) {
        let started = Instant::now();

        let mut workload = {
            let runner = self.runner.clone();
            let job = job.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move { runner.run(&job, cancel).await })
        };

        let result = match tokio::time::timeout(job.timeout(), &mut workload).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(WorkloadFailure::Crashed(join_error.to_string())),
            Err(_) => {
                warn!(
                    "Job {} exceeded its {}s deadline, abandoning it",
                    job.job_id, job.timeout_secs
                );
                self.cancel.cancel();
                Err(WorkloadFailure::Timeout)
            }
        };

        let outcome = JobOutcome::finalize(&job.job_id, result, started.elapsed());
        match outcome.failure_reason() {
            None if is_valid(&outcome) => info!("Job {} succeeded: {outcome}", job.job_id),
            None => warn!("Job {} succeeded without output: {outcome}", job.job_id),
            Some(reason) => warn!("Job {} failed ({reason}): {outcome}", job.job_id),
        }

        if let Err(e) = self.state.report_outcome(&outcome).await {
            error!("Failed to submit result for job {}: {e}", job.job_id);
        }

        guard.release().await;
        // No receivers is fine.
        let _ = self.outcomes.send(outcome);
    }
}
