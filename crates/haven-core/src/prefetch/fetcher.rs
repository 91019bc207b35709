use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::progress::FetchProgress;
use crate::error::PrefetchError;

/// Upper bound for the initial buffer reservation.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url` fully, calling `on_progress` after every chunk.
    /// Resolves to [`PrefetchError::Aborted`] once `cancel` fires.
    async fn fetch(
        &self,
        url: &str,
        cancel: CancellationToken,
        on_progress: &(dyn Fn(FetchProgress) + Send + Sync),
    ) -> Result<Vec<u8>, PrefetchError>;
}

pub struct HttpMediaFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpMediaFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn stream(
        &self,
        url: &str,
        on_progress: &(dyn Fn(FetchProgress) + Send + Sync),
    ) -> Result<Vec<u8>, PrefetchError> {
        let started = Instant::now();
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrefetchError::Http {
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let mut buf = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOC) as usize);
        while let Some(chunk) = response.chunk().await? {
            buf.extend_from_slice(&chunk);
            let secs = started.elapsed().as_secs_f64();
            on_progress(FetchProgress {
                loaded_bytes: buf.len() as u64,
                total_bytes: total,
                speed_bytes_per_sec: if secs > 0.0 { buf.len() as f64 / secs } else { 0.0 },
            });
        }
        debug!(url, size = buf.len(), "media fetched");
        Ok(buf)
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: CancellationToken,
        on_progress: &(dyn Fn(FetchProgress) + Send + Sync),
    ) -> Result<Vec<u8>, PrefetchError> {
        let secs = self.timeout.as_secs();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PrefetchError::Aborted),
            res = tokio::time::timeout(self.timeout, self.stream(url, on_progress)) => {
                res.unwrap_or(Err(PrefetchError::Timeout { secs }))
            }
        }
    }
}
