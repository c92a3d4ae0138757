use serde::{Deserialize, Serialize};

/// Acknowledgement returned by `POST /job`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobAck {
    pub status: String,
    pub job_id: String,
    pub message: String,
}

impl JobAck {
    pub fn accepted(job_id: impl Into<String>) -> Self {
        Self {
            status: "accepted".to_string(),
            job_id: job_id.into(),
            message: "Job dispatched for execution".to_string(),
        }
    }

    pub fn rejected(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "rejected".to_string(),
            job_id: job_id.into(),
            message: message.into(),
        }
    }
}

/// Body of `GET /status`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub running: bool,
    pub executor: bool,
    pub agent: bool,
    pub resource_status: String,
    pub resource_status_code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job: Option<String>,
}
