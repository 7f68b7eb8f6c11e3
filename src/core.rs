use async_trait::async_trait;
use serde::Deserialize;

use crate::Error;

/// Disposition of a transaction handed to the core node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreStatus {
    Pending,
    Duplicate,
    TryAgainLater,
    Error,
}

impl CoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoreStatus::Pending => "PENDING",
            CoreStatus::Duplicate => "DUPLICATE",
            CoreStatus::TryAgainLater => "TRY_AGAIN_LATER",
            CoreStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreSubmission {
    pub status: CoreStatus,
    /// Base64 `TransactionResult` explaining a rejected submission.
    pub error_result_xdr: Option<String>,
}

/// Submission path into the network's core node.
#[async_trait]
pub trait CoreSubmitter: Send + Sync {
    /// Hand a base64 transaction envelope to core. An `Err` means the
    /// submission itself failed (transport trouble or a core
    /// exception), not that the transaction was rejected.
    async fn submit_transaction(&self, envelope_xdr: &str) -> Result<CoreSubmission, Error>;
}

#[derive(Debug, Deserialize)]
struct CoreTxResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    exception: Option<String>,
}

/// [`CoreSubmitter`] speaking to stellar-core's HTTP `tx` endpoint.
pub struct HttpCoreSubmitter {
    client: reqwest::Client,
    core_url: String,
}

impl HttpCoreSubmitter {
    pub fn new(client: reqwest::Client, core_url: String) -> Self {
        Self { client, core_url }
    }
}

#[async_trait]
impl CoreSubmitter for HttpCoreSubmitter {
    async fn submit_transaction(&self, envelope_xdr: &str) -> Result<CoreSubmission, Error> {
        let url = format!("{}/tx", self.core_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("blob", envelope_xdr)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::CoreSubmission(format!(
                "core responded with {}",
                resp.status()
            )));
        }
        let body: CoreTxResponse = serde_json::from_slice(&resp.bytes().await?)?;

        if let Some(exception) = body.exception.filter(|e| !e.is_empty()) {
            return Err(Error::CoreSubmission(exception));
        }

        let status = match body.status.as_str() {
            "PENDING" => CoreStatus::Pending,
            "DUPLICATE" => CoreStatus::Duplicate,
            "TRY_AGAIN_LATER" => CoreStatus::TryAgainLater,
            "ERROR" => CoreStatus::Error,
            other => {
                return Err(Error::CoreSubmission(format!(
                    "unexpected core status {other}"
                )))
            }
        };

        Ok(CoreSubmission {
            status,
            error_result_xdr: body.error.filter(|e| !e.is_empty()),
        })
    }
}
