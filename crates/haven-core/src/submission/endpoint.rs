use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SubmissionError;
use crate::session::ClassificationRecord;
use crate::storage::ApiConfig;

/// Wire body for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionBatch {
    pub wallet_address: Option<String>,
    pub session_id: Option<String>,
    pub classifications: Vec<ClassificationRecord>,
}

impl SubmissionBatch {
    pub fn len(&self) -> usize {
        self.classifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifications.is_empty()
    }
}

#[async_trait]
pub trait SubmissionEndpoint: Send + Sync {
    /// Deliver the batch. `Ok` means the remote side accepted all of it.
    async fn submit(&self, batch: &SubmissionBatch) -> Result<(), SubmissionError>;
}

pub struct HttpSubmissionEndpoint {
    client: reqwest::Client,
    url: String,
}

impl HttpSubmissionEndpoint {
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self {
            client,
            url: format!("{}/classification/submit", api.base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SubmissionEndpoint for HttpSubmissionEndpoint {
    async fn submit(&self, batch: &SubmissionBatch) -> Result<(), SubmissionError> {
        debug!(url = %self.url, count = batch.len(), "posting classification batch");
        let response = self.client.post(&self.url).json(batch).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %message, "submission rejected");
        Err(SubmissionError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
