use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::endpoint::{SubmissionBatch, SubmissionEndpoint};
use crate::error::SubmissionError;
use crate::events::Event;
use crate::session::SessionContext;
use crate::storage::Config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub count: usize,
    pub session_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

pub struct SubmissionPipeline {
    endpoint: Arc<dyn SubmissionEndpoint>,
    timeout: Duration,
    require_wallet: bool,
}

impl SubmissionPipeline {
    pub fn new(endpoint: Arc<dyn SubmissionEndpoint>, config: &Config) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(config.api.submit_timeout_secs),
            require_wallet: config.session.require_wallet_for_submit,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Submit every pending classification as one batch.
    ///
    /// Local state is cleared and the wallet disconnected only after the
    /// endpoint accepts the batch. Any failure leaves the records in place
    /// and publishes `SubmissionFailed`. There is no automatic retry.
    pub async fn submit(&self, ctx: &SessionContext) -> Result<SubmissionReceipt, SubmissionError> {
        match self.try_submit(ctx).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                let pending = ctx.store().pending_count() as usize;
                warn!(error = %err, pending, "submission failed");
                ctx.publish(&Event::SubmissionFailed {
                    message: err.to_string(),
                    transient: err.is_transient(),
                    pending,
                    at: ctx.clock().now_utc(),
                });
                Err(err)
            }
        }
    }

    async fn try_submit(&self, ctx: &SessionContext) -> Result<SubmissionReceipt, SubmissionError> {
        let wallet_address = ctx.wallet().address();
        if self.require_wallet && wallet_address.is_none() {
            return Err(SubmissionError::NotConnected);
        }

        let session_id = ctx.store().session_id();
        let pending = ctx.store().pending_batch()?;
        let batch = SubmissionBatch {
            wallet_address,
            session_id: session_id.clone(),
            classifications: pending.records.clone(),
        };
        if batch.is_empty() {
            info!("nothing to submit");
            return Ok(SubmissionReceipt {
                count: 0,
                session_id,
                submitted_at: ctx.clock().now_utc(),
            });
        }

        let count = batch.len();
        tokio::time::timeout(self.timeout, self.endpoint.submit(&batch))
            .await
            .map_err(|_| SubmissionError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        ctx.reset_after_submission(&pending)?;
        // A fresh connection is required for the next batch.
        if let Err(e) = ctx.disconnect_wallet() {
            warn!(error = %e, "failed to disconnect wallet after submission");
        }

        let submitted_at = ctx.clock().now_utc();
        info!(count, "batch submitted");
        ctx.publish(&Event::BatchSubmitted {
            count,
            at: submitted_at,
        });
        Ok(SubmissionReceipt {
            count,
            session_id,
            submitted_at,
        })
    }
}
