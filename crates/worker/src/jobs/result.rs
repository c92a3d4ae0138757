use super::runner::WorkloadFailure;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use shared::models::ResultAttestation;
use std::fmt;
use std::time::Duration;

pub(crate) type ResultHash = [u8; 32];

/// SHA-256 over `"<job_id>:<output>:<succeeded>:<completed_at unix seconds>"`.
pub(crate) fn hash(job_id: &str, output: &str, succeeded: bool, completed_at: i64) -> ResultHash {
    let mut hasher = Sha256::new();
    hasher.update(format!("{job_id}:{output}:{succeeded}:{completed_at}").as_bytes());
    hasher.finalize().into()
}

/// An outcome is valid when the job succeeded and produced output.
pub(crate) fn is_valid(outcome: &JobOutcome) -> bool {
    outcome.succeeded && outcome.failure.is_none() && !outcome.output.is_empty()
}

/// Immutable record of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JobOutcome {
    pub(crate) job_id: String,
    pub(crate) succeeded: bool,
    pub(crate) output: String,
    pub(crate) result_hash: ResultHash,
    pub(crate) duration: Duration,
    pub(crate) failure: Option<WorkloadFailure>,
    pub(crate) completed_at: DateTime<Utc>,
}

impl JobOutcome {
    pub(crate) fn finalize(
        job_id: &str,
        result: Result<String, WorkloadFailure>,
        duration: Duration,
    ) -> Self {
        Self::finalize_at(job_id, result, duration, Utc::now())
    }

    pub(crate) fn finalize_at(
        job_id: &str,
        result: Result<String, WorkloadFailure>,
        duration: Duration,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let (succeeded, output, failure) = match result {
            Ok(output) => (true, output, None),
            Err(failure) => (false, String::new(), Some(failure)),
        };
        let result_hash = hash(job_id, &output, succeeded, completed_at.timestamp());
        Self {
            job_id: job_id.to_string(),
            succeeded,
            output,
            result_hash,
            duration,
            failure,
            completed_at,
        }
    }

    pub(crate) fn hash_hex(&self) -> String {
        hex::encode(self.result_hash)
    }

    /// Failure reason as reported in logs, e.g. `"timeout"`.
    pub(crate) fn failure_reason(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }

    pub(crate) fn attestation(&self) -> ResultAttestation {
        ResultAttestation {
            job_id: self.job_id.clone(),
            result_hash: self.hash_hex(),
            succeeded: self.succeeded,
            completed_at: self.completed_at.timestamp(),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.succeeded { "SUCCESS" } else { "FAILED" };
        let hash = self.hash_hex();
        write!(
            f,
            "JobOutcome{{ID={}, Status={status}, Duration={:?}, Hash={}...}}",
            self.job_id,
            self.duration,
            &hash[..16]
        )
    }
}
