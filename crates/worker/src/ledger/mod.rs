use async_trait::async_trait;
use shared::models::{ResourceCapability, ResourceStatus, ResultAttestation};

pub(crate) mod http;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod retry;

pub(crate) use http::HttpLedgerClient;
pub(crate) use retry::RetryingLedgerClient;

#[derive(Debug, thiserror::Error)]
pub(crate) enum LedgerError {
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ledger rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid ledger client configuration: {0}")]
    InvalidConfig(String),
    #[cfg(test)]
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Transport failures and server-side errors may succeed on a later
    /// attempt; anything the ledger explicitly refused will not.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Transport(_) => true,
            LedgerError::Rejected { status, .. } => *status >= 500,
            LedgerError::InvalidConfig(_) => false,
            #[cfg(test)]
            LedgerError::Unavailable(_) => true,
        }
    }
}

/// State-changing operations the agent submits to the ledger on behalf of
/// its resource.
#[async_trait]
pub(crate) trait LedgerClient: Send + Sync {
    /// Creates or refreshes the on-ledger resource record. Repeating an
    /// identical registration is expected to be a no-op server side.
    async fn register_resource(&self, capability: &ResourceCapability) -> Result<(), LedgerError>;

    async fn update_status(
        &self,
        resource_id: u64,
        status: ResourceStatus,
    ) -> Result<(), LedgerError>;

    async fn submit_result(
        &self,
        resource_id: u64,
        attestation: &ResultAttestation,
    ) -> Result<(), LedgerError>;
}
