use super::{LedgerClient, LedgerError};
use async_trait::async_trait;
use log::warn;
use shared::models::{ResourceCapability, ResourceStatus, ResultAttestation};
use std::future::Future;
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Wraps a ledger client with bounded exponential backoff for transient
/// failures. Once retries are exhausted the last error is returned to the
/// caller unchanged.
///
/// Status updates are sent once. They run under the state controller's
/// lock, and a failed one is re-sent by the next heartbeat.
pub(crate) struct RetryingLedgerClient<C> {
    inner: C,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl<C: LedgerClient> RetryingLedgerClient<C> {
    pub(crate) fn new(inner: C, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }

    #[cfg(test)]
    fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    async fn with_retry<F, Fut>(&self, operation: &str, mut call: F) -> Result<(), LedgerError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<(), LedgerError>> + Send,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Ledger {operation} failed (attempt {attempt}/{}): {e}. Retrying in {}ms",
                        self.max_retries + 1,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<C: LedgerClient> LedgerClient for RetryingLedgerClient<C> {
    async fn register_resource(&self, capability: &ResourceCapability) -> Result<(), LedgerError> {
        self.with_retry("registration", || self.inner.register_resource(capability))
            .await
    }

    async fn update_status(
        &self,
        resource_id: u64,
        status: ResourceStatus,
    ) -> Result<(), LedgerError> {
        self.inner.update_status(resource_id, status).await
    }

    async fn submit_result(
        &self,
        resource_id: u64,
        attestation: &ResultAttestation,
    ) -> Result<(), LedgerError> {
        self.with_retry("result submission", || {
            self.inner.submit_result(resource_id, attestation)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::MockLedgerClient;
    use mockito::Server;
    use url::Url;

    fn fast(inner: MockLedgerClient, retries: u32) -> RetryingLedgerClient<MockLedgerClient> {
        RetryingLedgerClient::new(inner, retries)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
    }

    fn attestation() -> ResultAttestation {
        ResultAttestation {
            job_id: "J1".to_string(),
            result_hash: "ab".repeat(32),
            succeeded: true,
            completed_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let mock = MockLedgerClient::new();
        mock.fail_next_results(2);
        let client = fast(mock, 3);

        client.submit_result(5, &attestation()).await.unwrap();
        assert_eq!(client.inner.result_attempts(), 3);
        assert_eq!(client.inner.results().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let mock = MockLedgerClient::new();
        mock.set_results_failing(true);
        let client = fast(mock, 2);

        let result = client.submit_result(5, &attestation()).await;
        assert!(result.is_err());
        assert_eq!(client.inner.result_attempts(), 3);
    }

    #[tokio::test]
    async fn test_status_updates_are_sent_once() {
        let mock = MockLedgerClient::new();
        mock.fail_next_status_updates(1);
        let client = RetryingLedgerClient::new(mock, 3);

        let started = std::time::Instant::now();
        assert!(client.update_status(5, ResourceStatus::Busy).await.is_err());
        assert!(started.elapsed() < INITIAL_BACKOFF);
        assert_eq!(client.inner.status_attempts(), 1);
        assert!(client.inner.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/resources/9/results")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let url = Url::parse(&server.url()).unwrap();
        let http =
            crate::ledger::HttpLedgerClient::new(&url, "k", "h", Duration::from_secs(5)).unwrap();
        let client = RetryingLedgerClient::new(http, 3)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(1));

        let err = client
            .submit_result(9, &attestation())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { status: 401, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/resources/9/results")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let url = Url::parse(&server.url()).unwrap();
        let http =
            crate::ledger::HttpLedgerClient::new(&url, "k", "h", Duration::from_secs(5)).unwrap();
        let client = RetryingLedgerClient::new(http, 1)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(1));

        assert!(client.submit_result(9, &attestation()).await.is_err());
        mock.assert_async().await;
    }
}
