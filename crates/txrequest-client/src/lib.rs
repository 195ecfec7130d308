//! TxRequest Client
//!
//! HTTP client for the Coordination Service REST routes.

use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use tss_core::session::{async_trait, RemoteSessionClient};
use tss_core::sign::{SignatureShareSubmission, TxRequestList};
use tss_core::{Error, Result, SignatureShareRecord, TxRequest, UnsignedTx};

/// Where and how to reach the Coordination Service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub wallet_id: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, wallet_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            wallet_id: wallet_id.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn tx_requests_url(&self) -> String {
        format!("{}/wallet/{}/txrequests", self.base_url, self.wallet_id)
    }
}

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::Remote {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

/// HTTP-based Coordination Service client
#[derive(Debug, Clone)]
pub struct TxRequestClient {
    /// HTTP client
    client: Client,
    config: ClientConfig,
}

impl TxRequestClient {
    /// Create a new client for `wallet_id`
    pub fn new(base_url: &str, wallet_id: &str) -> Self {
        Self::from_config(ClientConfig::new(base_url, wallet_id))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a TxRequest for `unsigned_txs`
    #[instrument(skip(self, unsigned_txs), fields(wallet_id = %self.config.wallet_id))]
    pub async fn create_tx_request(&self, unsigned_txs: Vec<UnsignedTx>) -> Result<TxRequest> {
        let response = self
            .client
            .post(self.config.tx_requests_url())
            .json(&serde_json::json!({ "unsignedTxs": unsigned_txs }))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let tx_request: TxRequest = check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Deserialization(e.to_string()))?;

        debug!(tx_request_id = %tx_request.tx_request_id, "TxRequest created");
        Ok(tx_request)
    }
}

/// Pass successful responses through; turn the rest into `Error::Remote`
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(Error::Remote {
        status: Some(status.as_u16()),
        message,
    })
}

#[async_trait]
impl RemoteSessionClient for TxRequestClient {
    #[instrument(skip(self, share, signer_share), fields(from = %share.from, to = %share.to))]
    async fn send_signature_share(
        &self,
        tx_request_id: &str,
        share: &SignatureShareRecord,
        signer_share: Option<&str>,
    ) -> Result<SignatureShareRecord> {
        let body = SignatureShareSubmission {
            signature_share: share.clone(),
            signer_share: signer_share.map(str::to_string),
        };

        let response = self
            .client
            .post(format!(
                "{}/{}/signatureshares",
                self.config.tx_requests_url(),
                tx_request_id
            ))
            .json(&body)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let stored: SignatureShareRecord = check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Deserialization(e.to_string()))?;

        debug!("Signature share sent");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn get_tx_request(&self, tx_request_id: &str) -> Result<TxRequest> {
        let response = self
            .client
            .get(self.config.tx_requests_url())
            .query(&[("txRequestIds", tx_request_id), ("latest", "true")])
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let list: TxRequestList = check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Deserialization(e.to_string()))?;

        list.tx_requests
            .into_iter()
            .next()
            .ok_or_else(|| Error::TxRequestNotFound(tx_request_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tss_core::{ErrorKind, Role};
    use txrequest_store::TxRequestStore;

    async fn spawn_service() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = txrequest_svc::router(TxRequestStore::default());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn unsigned_tx() -> UnsignedTx {
        UnsignedTx {
            signable_hex: "deadbeef".into(),
            serialized_tx_hex: "00".into(),
        }
    }

    #[tokio::test]
    async fn test_create_send_and_fetch() {
        let url = spawn_service().await;
        let client = TxRequestClient::new(&url, "wallet").with_timeout(Duration::from_secs(5));

        let tx_request = client.create_tx_request(vec![unsigned_tx()]).await.unwrap();
        let record = SignatureShareRecord {
            from: Role::User,
            to: Role::Bitgo,
            share: "ab".repeat(64),
        };

        let echoed = client
            .send_signature_share(&tx_request.tx_request_id, &record, Some("signer"))
            .await
            .unwrap();
        assert_eq!(echoed, record);

        let fetched = client
            .get_tx_request(&tx_request.tx_request_id)
            .await
            .unwrap();
        assert_eq!(fetched.signature_shares, vec![record]);
        assert_eq!(fetched.signable_payload().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[tokio::test]
    async fn test_unknown_tx_request() {
        let url = spawn_service().await;
        let client = TxRequestClient::new(&url, "wallet");

        let err = client.get_tx_request("missing").await.unwrap_err();
        assert!(matches!(err, Error::TxRequestNotFound(_)));
    }

    #[tokio::test]
    async fn test_service_errors_pass_through() {
        let url = spawn_service().await;
        let client = TxRequestClient::new(&url, "wallet");

        let record = SignatureShareRecord {
            from: Role::User,
            to: Role::Bitgo,
            share: "ab".into(),
        };
        let err = client
            .send_signature_share("missing", &record, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Remote);
        match err {
            Error::Remote { status, message } => {
                assert_eq!(status, Some(404));
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let client = TxRequestClient::new("http://127.0.0.1:1", "wallet")
            .with_timeout(Duration::from_secs(2));
        let err = client.get_tx_request("any").await.unwrap_err();
        assert!(matches!(err, Error::Remote { status: None, .. }));
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = ClientConfig::new("http://localhost:8080/", "w1");
        assert_eq!(
            config.tx_requests_url(),
            "http://localhost:8080/wallet/w1/txrequests"
        );
    }
}
