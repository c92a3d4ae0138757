use super::runner::{WorkloadFailure, WorkloadRunner};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use shared::models::JobSpec;
use std::future::Future;
use strip_ansi_escapes::strip;
use tokio_util::sync::CancellationToken;

const DEFAULT_LOG_TAIL: i64 = 1000;

/// Runs each job as a one-shot container. The job input is passed in the
/// `INPUT_DATA` environment variable and the container's log output is the
/// job result.
pub(crate) struct DockerRunner {
    docker: Docker,
}

impl DockerRunner {
    pub(crate) fn new() -> Result<Self, DockerError> {
        let docker = match Docker::connect_with_unix_defaults() {
            Ok(docker) => docker,
            Err(e) => {
                error!("Failed to connect to Docker daemon: {e}");
                return Err(e);
            }
        };
        Ok(Self { docker })
    }

    /// Pull a Docker image if it doesn't exist locally
    async fn pull_image(&self, image: &str) -> Result<(), DockerError> {
        let should_always_pull = image.ends_with(":latest");
        if !should_always_pull && self.docker.inspect_image(image).await.is_ok() {
            debug!("Image {image} already exists locally");
            return Ok(());
        }
        info!("Pulling image {image}");

        let (image_name, tag) = match image.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (image, "latest"),
        };
        let options = CreateImageOptions {
            from_image: image_name,
            tag,
            ..Default::default()
        };

        let mut image_stream = self.docker.create_image(Some(options), None, None);
        while let Some(info) = image_stream.next().await {
            let progress = info?;
            debug!("Pull progress: {progress:?}");
        }
        Ok(())
    }

    async fn create_and_start(&self, job: &JobSpec) -> Result<String, DockerError> {
        let name = container_name(&job.job_id);
        let options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };
        let config = Config {
            image: Some(job.workload_ref.clone()),
            env: Some(vec![format!("INPUT_DATA={}", job.input_data)]),
            ..Default::default()
        };

        let container = self.docker.create_container(Some(options), config).await?;
        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await?;
        info!("Container {name} ({}) started for job {}", container.id, job.job_id);
        Ok(container.id)
    }

    async fn wait_for_exit(&self, container_id: &str) -> Result<i64, DockerError> {
        let mut stream = self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions<String>>);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }

    async fn container_logs(&self, container_id: &str) -> Result<String, DockerError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: DEFAULT_LOG_TAIL.to_string(),
            timestamps: false,
            follow: false,
            ..Default::default()
        };

        let mut logs_stream = self.docker.logs(container_id, Some(options));
        let mut all_logs = Vec::new();
        // A line updated in place via carriage returns keeps only its last state.
        let mut current_line = String::new();

        while let Some(log_result) = logs_stream.next().await {
            let message_bytes = match log_result? {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message }
                | LogOutput::StdIn { message } => message,
            };
            let cleaned = strip(&message_bytes);
            let cleaned_str = String::from_utf8_lossy(&cleaned);

            if cleaned_str.contains('\r') {
                if let Some(last_segment) = cleaned_str.split('\r').last() {
                    current_line = last_segment.to_string();
                }
            } else {
                if !current_line.is_empty() {
                    all_logs.push(std::mem::take(&mut current_line));
                }
                for line in cleaned_str.lines() {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        all_logs.push(trimmed.to_string());
                    }
                }
            }
        }
        if !current_line.is_empty() {
            all_logs.push(current_line);
        }
        Ok(all_logs.join("\n"))
    }

    async fn remove(&self, container_id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(container_id, Some(options)).await {
            Ok(()) => debug!("Container {container_id} removed"),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => warn!("Failed to remove container {container_id}: {e}"),
        }
    }
}

#[async_trait]
impl WorkloadRunner for DockerRunner {
    async fn run(
        &self,
        job: &JobSpec,
        cancel: CancellationToken,
    ) -> Result<String, WorkloadFailure> {
        unless_cancelled(&cancel, self.pull_image(&job.workload_ref))
            .await
            .ok_or(WorkloadFailure::Cancelled)?
            .map_err(|e| WorkloadFailure::Runtime(format!("failed to pull image: {e}")))?;

        let Some(started) = unless_cancelled(&cancel, self.create_and_start(job)).await else {
            // The container may exist without its id being known yet.
            self.remove(&container_name(&job.job_id)).await;
            return Err(WorkloadFailure::Cancelled);
        };
        let container_id = started
            .map_err(|e| WorkloadFailure::Runtime(format!("failed to start container: {e}")))?;

        let exit = tokio::select! {
            exit = self.wait_for_exit(&container_id) => exit,
            _ = cancel.cancelled() => {
                info!("Stopping container {container_id} for cancelled job {}", job.job_id);
                if let Err(e) = self.docker.stop_container(&container_id, None).await {
                    warn!("Failed to stop container {container_id}: {e}");
                }
                self.remove(&container_id).await;
                return Err(WorkloadFailure::Cancelled);
            }
        };

        let logs = self.container_logs(&container_id).await;
        self.remove(&container_id).await;

        let code = exit.map_err(|e| WorkloadFailure::Runtime(e.to_string()))?;
        let logs = logs.map_err(|e| WorkloadFailure::Runtime(format!("failed to read logs: {e}")))?;
        if code != 0 {
            warn!("Job {} container exited with {code}: {logs}", job.job_id);
            return Err(WorkloadFailure::ExitCode(code));
        }
        Ok(logs)
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}

/// Drives `step` to completion unless `cancel` fires first.
async fn unless_cancelled<T>(cancel: &CancellationToken, step: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = step => Some(output),
    }
}

/// Container names only allow `[a-zA-Z0-9_.-]`.
fn container_name(job_id: &str) -> String {
    let sanitized: String = job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("flux-job-{sanitized}")
}
