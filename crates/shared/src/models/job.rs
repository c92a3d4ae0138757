use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of `POST /job` as sent by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub job_id: String,
    /// Container image holding the workload.
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub input_data: String,
    #[serde(default)]
    pub timeout_sec: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("timeout_sec must be positive, got {0}")]
    InvalidTimeout(i64),
    #[error("malformed job request: {0}")]
    Malformed(String),
}

/// A validated job, consumed once by admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_id: String,
    pub workload_ref: String,
    pub input_data: String,
    pub timeout_secs: u64,
}

impl JobSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parses and validates a raw request body.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let request: JobRequest = serde_json::from_slice(body)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::try_from(request)
    }
}

impl TryFrom<JobRequest> for JobSpec {
    type Error = ValidationError;

    fn try_from(request: JobRequest) -> Result<Self, Self::Error> {
        if request.job_id.trim().is_empty() {
            return Err(ValidationError::MissingField("job_id"));
        }
        if request.image_url.trim().is_empty() {
            return Err(ValidationError::MissingField("image_url"));
        }
        if request.timeout_sec <= 0 {
            return Err(ValidationError::InvalidTimeout(request.timeout_sec));
        }

        Ok(Self {
            job_id: request.job_id,
            workload_ref: request.image_url,
            input_data: request.input_data,
            timeout_secs: request.timeout_sec as u64,
        })
    }
}

/// Result attestation posted to the ledger once a job is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultAttestation {
    pub job_id: String,
    /// Hex encoded SHA-256 result digest.
    pub result_hash: String,
    pub succeeded: bool,
    pub completed_at: i64,
}
