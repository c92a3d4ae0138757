use super::{LedgerClient, LedgerError};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use shared::models::{ResourceCapability, ResourceStatus, ResultAttestation};
use std::time::Duration;
use url::Url;

const HOST_KEY_HEADER: &str = "x-host-key";

/// Ledger gateway client speaking JSON over HTTP.
///
/// Transaction construction and signing happen behind the gateway; this
/// client only authenticates with the API key and identifies the host by
/// its public key.
#[derive(Debug, Clone)]
pub(crate) struct HttpLedgerClient {
    base_url: String,
    host_key: String,
    client: Client,
}

impl HttpLedgerClient {
    pub(crate) fn new(
        endpoint: &Url,
        api_key: &str,
        host_key: &str,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| LedgerError::InvalidConfig("API key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        let host = HeaderValue::from_str(host_key)
            .map_err(|_| LedgerError::InvalidConfig("host key is not a valid header value".into()))?;
        headers.insert(HOST_KEY_HEADER, host);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: endpoint.as_str().trim_end_matches('/').to_string(),
            host_key: host_key.to_string(),
            client,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), LedgerError> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");

        let response = self.client.post(&url).json(body).send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        Err(LedgerError::Rejected { status, body })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn register_resource(&self, capability: &ResourceCapability) -> Result<(), LedgerError> {
        let payload = json!({
            "instruction": "register_resource",
            "host": self.host_key,
            "specs": capability,
        });
        self.post("/resources", &payload).await
    }

    async fn update_status(
        &self,
        resource_id: u64,
        status: ResourceStatus,
    ) -> Result<(), LedgerError> {
        let payload = json!({
            "instruction": "update_resource_status",
            "host": self.host_key,
            "status": status,
        });
        self.post(&format!("/resources/{resource_id}/status"), &payload)
            .await
    }

    async fn submit_result(
        &self,
        resource_id: u64,
        attestation: &ResultAttestation,
    ) -> Result<(), LedgerError> {
        let payload = json!({
            "instruction": "submit_job_result",
            "host": self.host_key,
            "result": attestation,
        });
        self.post(&format!("/resources/{resource_id}/results"), &payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client_for(server: &Server) -> HttpLedgerClient {
        let url = Url::parse(&server.url()).unwrap();
        HttpLedgerClient::new(&url, "secret", "abcd", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_update_status_sends_ordinal() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/resources/42/status")
            .match_header("authorization", "Bearer secret")
            .match_header("x-host-key", "abcd")
            .match_body(Matcher::Json(json!({
                "instruction": "update_resource_status",
                "host": "abcd",
                "status": 1
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .update_status(42, ResourceStatus::Busy)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_carries_full_capability() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/resources")
            .match_body(Matcher::PartialJson(json!({
                "instruction": "register_resource",
                "specs": {
                    "id": 7,
                    "gpu_model": "CPU-Only",
                    "vram_gb": 0,
                    "cpu_cores": 8,
                    "compute_rating": 4000,
                    "price_per_hour": 5000
                }
            })))
            .with_status(201)
            .create_async()
            .await;

        let capability = ResourceCapability {
            resource_id: 7,
            gpu_model: "CPU-Only".to_string(),
            vram_gb: 0,
            cpu_cores: 8,
            compute_rating: 4000,
            price_per_hour: 5000,
        };
        client_for(&server)
            .register_resource(&capability)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_surfaces_status_and_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/resources/1/results")
            .with_status(403)
            .with_body("host mismatch")
            .create_async()
            .await;

        let attestation = ResultAttestation {
            job_id: "J1".to_string(),
            result_hash: "00".repeat(32),
            succeeded: true,
            completed_at: 0,
        };
        let err = client_for(&server)
            .submit_result(1, &attestation)
            .await
            .unwrap_err();
        match err {
            LedgerError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "host mismatch");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_api_key_is_config_error() {
        let url = Url::parse("http://localhost:1").unwrap();
        let result = HttpLedgerClient::new(&url, "bad\nkey", "abcd", Duration::from_secs(1));
        assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
    }
}
