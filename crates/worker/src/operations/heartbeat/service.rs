use crate::state::{StateController, SyncError};
use shared::models::ResourceStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub(crate) const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum HeartbeatError {
    #[error("heartbeat is already running")]
    AlreadyStarted,
}

/// Periodically re-asserts the current status so the ledger converges on
/// it after missed updates, and reports Offline when stopped.
///
/// A beat reads the status under the controller's update lock, so it never
/// re-sends a value that a job transition has already replaced.
pub(crate) struct HeartbeatService {
    state: Arc<StateController>,
    interval: Duration,
    started: AtomicBool,
}

impl HeartbeatService {
    pub(crate) fn new(state: Arc<StateController>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            state,
            interval,
            started: AtomicBool::new(false),
        })
    }

    /// Spawns the heartbeat loop. The first beat fires one interval after
    /// start. Cancelling `cancellation_token` ends the loop after a final
    /// Offline report; await the handle to know it was sent.
    pub(crate) fn start(
        &self,
        cancellation_token: CancellationToken,
    ) -> Result<JoinHandle<()>, HeartbeatError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(HeartbeatError::AlreadyStarted);
        }

        let state = self.state.clone();
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut had_error = false;
            let mut first_beat = true;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match beat(&state).await {
                            Ok(status) => {
                                if had_error {
                                    log::info!("Ledger sync restored - status {status} confirmed");
                                    had_error = false;
                                } else if first_beat {
                                    log::info!("First heartbeat confirmed status {status}");
                                    first_beat = false;
                                } else {
                                    log::debug!("Heartbeat confirmed status {status}");
                                }
                            }
                            Err(SyncError::Closed) => {
                                log::debug!("State controller closed, heartbeat exiting");
                                break;
                            }
                            Err(e) => {
                                log::error!("Heartbeat failed to sync with ledger: {e}");
                                had_error = true;
                            }
                        }
                    }
                    _ = cancellation_token.cancelled() => {
                        log::info!("Heartbeat received cancellation signal");
                        match state.shutdown().await {
                            Ok(()) => log::info!("Reported Offline to ledger"),
                            Err(SyncError::Closed) => {}
                            Err(e) => log::error!("Failed to report Offline to ledger: {e}"),
                        }
                        break;
                    }
                }
            }
            log::info!("Heartbeat service stopped");
        });
        Ok(handle)
    }
}

/// One heartbeat: re-send the current status.
pub(crate) async fn beat(state: &StateController) -> Result<ResourceStatus, SyncError> {
    state.reassert().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedgerClient;

    fn setup() -> (Arc<MockLedgerClient>, Arc<StateController>) {
        let ledger = Arc::new(MockLedgerClient::new());
        let state = Arc::new(StateController::new(4, ledger.clone()));
        (ledger, state)
    }

    #[tokio::test]
    async fn test_beat_reasserts_current_status() {
        let (ledger, state) = setup();
        state.set_status(ResourceStatus::Busy).await.unwrap();

        assert_eq!(beat(&state).await.unwrap(), ResourceStatus::Busy);
        assert_eq!(
            ledger.statuses(),
            vec![ResourceStatus::Busy, ResourceStatus::Busy]
        );
    }

    #[tokio::test]
    async fn test_beat_racing_idle_restore_does_not_pin_busy() {
        let (ledger, state) = setup();
        state.set_status(ResourceStatus::Busy).await.unwrap();
        ledger.set_status_delay(Duration::from_millis(50));

        let restore = {
            let state = state.clone();
            tokio::spawn(async move { state.set_status(ResourceStatus::Idle).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let racing = beat(&state).await.unwrap();
        restore.await.unwrap().unwrap();
        assert_eq!(racing, ResourceStatus::Idle);

        for _ in 0..5 {
            beat(&state).await.unwrap();
        }
        assert_eq!(state.get_status(), ResourceStatus::Idle);
        let statuses = ledger.statuses();
        assert!(statuses[1..].iter().all(|s| *s == ResourceStatus::Idle));
    }

    #[tokio::test]
    async fn test_loop_beats_periodically_then_reports_offline() {
        let (ledger, state) = setup();
        let service = HeartbeatService::new(state.clone(), Duration::from_millis(50));
        let token = CancellationToken::new();
        let handle = service.start(token.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(180)).await;
        token.cancel();
        handle.await.unwrap();

        let statuses = ledger.statuses();
        assert!(statuses.len() >= 3, "expected beats, got {statuses:?}");
        assert_eq!(statuses.last(), Some(&ResourceStatus::Offline));
        assert!(statuses[..statuses.len() - 1]
            .iter()
            .all(|s| *s == ResourceStatus::Idle));
        assert_eq!(state.get_status(), ResourceStatus::Offline);
    }

    #[tokio::test]
    async fn test_no_beat_before_first_interval() {
        let (ledger, state) = setup();
        let service = HeartbeatService::new(state, Duration::from_secs(60));
        let token = CancellationToken::new();
        let handle = service.start(token.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ledger.statuses().is_empty());

        token.cancel();
        handle.await.unwrap();
        assert_eq!(ledger.statuses(), vec![ResourceStatus::Offline]);
    }

    #[tokio::test]
    async fn test_ledger_failures_do_not_stop_loop() {
        let (ledger, state) = setup();
        ledger.set_status_failing(true);
        let service = HeartbeatService::new(state.clone(), Duration::from_millis(30));
        let token = CancellationToken::new();
        let handle = service.start(token.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        ledger.set_status_failing(false);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(ledger.status_attempts() >= 3);
        assert!(!ledger.statuses().is_empty());
        assert!(!handle.is_finished());

        token.cancel();
        handle.await.unwrap();
        assert_eq!(ledger.statuses().last(), Some(&ResourceStatus::Offline));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (_ledger, state) = setup();
        let service = HeartbeatService::new(state, Duration::from_secs(30));
        let token = CancellationToken::new();
        let handle = service.start(token.clone()).unwrap();
        assert!(matches!(
            service.start(token.clone()),
            Err(HeartbeatError::AlreadyStarted)
        ));
        token.cancel();
        handle.await.unwrap();
    }
}
