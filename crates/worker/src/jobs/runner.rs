use async_trait::async_trait;
use log::info;
use shared::models::JobSpec;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a workload did not produce a result. The `Display` form is the
/// failure reason recorded on the outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum WorkloadFailure {
    #[error("timeout")]
    Timeout,
    #[error("cancelled")]
    Cancelled,
    #[error("workload crashed: {0}")]
    Crashed(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("workload exited with code {0}")]
    ExitCode(i64),
}

/// Executes a single workload to completion.
///
/// Implementations must return promptly once `cancel` fires; the caller
/// abandons the run and records a failure at its deadline regardless.
#[async_trait]
pub(crate) trait WorkloadRunner: Send + Sync {
    async fn run(&self, job: &JobSpec, cancel: CancellationToken)
        -> Result<String, WorkloadFailure>;

    fn name(&self) -> &'static str;
}

/// Stand-in runner for hosts without a container runtime.
#[derive(Debug, Clone)]
pub(crate) struct SimulatedRunner {
    delay: Duration,
}

impl SimulatedRunner {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl WorkloadRunner for SimulatedRunner {
    async fn run(
        &self,
        job: &JobSpec,
        cancel: CancellationToken,
    ) -> Result<String, WorkloadFailure> {
        info!(
            "Simulating job {} with image {} ({} bytes of input)",
            job.job_id,
            job.workload_ref,
            job.input_data.len()
        );
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(format!(
                "Job {} completed successfully with image {}",
                job.job_id, job.workload_ref
            )),
            _ = cancel.cancelled() => Err(WorkloadFailure::Cancelled),
        }
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub(crate) enum Script {
        Succeed { output: String, after: Duration },
        Fail(WorkloadFailure),
        Panic,
        /// Runs until cancelled, then reports it.
        Hang,
        /// Ignores cancellation entirely.
        Stubborn,
    }

    #[derive(Debug)]
    pub(crate) struct ScriptedRunner {
        script: Script,
        pub(crate) started: AtomicUsize,
        pub(crate) saw_cancel: Arc<AtomicBool>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(script: Script) -> Self {
            Self {
                script,
                started: AtomicUsize::new(0),
                saw_cancel: Arc::new(AtomicBool::new(false)),
            }
        }

        pub(crate) fn succeeding(output: &str, after: Duration) -> Self {
            Self::new(Script::Succeed {
                output: output.to_string(),
                after,
            })
        }
    }

    #[async_trait]
    impl WorkloadRunner for ScriptedRunner {
        async fn run(
            &self,
            _job: &JobSpec,
            cancel: CancellationToken,
        ) -> Result<String, WorkloadFailure> {
            self.started.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Succeed { output, after } => {
                    tokio::time::sleep(*after).await;
                    Ok(output.clone())
                }
                Script::Fail(failure) => Err(failure.clone()),
                Script::Panic => panic!("workload blew up"),
                Script::Hang => {
                    cancel.cancelled().await;
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    Err(WorkloadFailure::Cancelled)
                }
                Script::Stubborn => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobSpec {
        JobSpec {
            job_id: "J1".to_string(),
            workload_ref: "alpine:3".to_string(),
            input_data: "hello".to_string(),
            timeout_secs: 10,
        }
    }

    #[tokio::test]
    async fn test_simulated_runner_reports_image() {
        let runner = SimulatedRunner::new(Duration::from_millis(5));
        let output = runner.run(&job(), CancellationToken::new()).await.unwrap();
        assert_eq!(output, "Job J1 completed successfully with image alpine:3");
    }

    #[tokio::test]
    async fn test_simulated_runner_honours_cancellation() {
        let runner = SimulatedRunner::new(Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();
        let result = runner.run(&job(), token).await;
        assert_eq!(result, Err(WorkloadFailure::Cancelled));
    }

    #[test]
    fn test_failure_reasons() {
        assert_eq!(WorkloadFailure::Timeout.to_string(), "timeout");
        assert_eq!(WorkloadFailure::Cancelled.to_string(), "cancelled");
        assert_eq!(
            WorkloadFailure::ExitCode(2).to_string(),
            "workload exited with code 2"
        );
    }
}
