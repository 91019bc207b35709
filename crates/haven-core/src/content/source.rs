//! Content sources.
//!
//! The core treats every source as an opaque supplier of clip batches.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::types::{Content, LabelOption, VideoClip};
use crate::error::ContentError;
use crate::storage::ApiConfig;

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_next_batch(&self) -> Result<Vec<Content>, ContentError>;
}

#[async_trait]
pub trait LabelSource: Send + Sync {
    async fn alternative_labels(&self) -> Result<Vec<LabelOption>, ContentError>;
}

pub(crate) fn join_url(base: &str, path: &str) -> Result<Url, ContentError> {
    Ok(Url::parse(&format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))?)
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: Url,
) -> Result<T, ContentError> {
    let response = client
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "content request failed");
        return Err(ContentError::Status {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json().await?)
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    video_clips: Vec<VideoClip>,
}

/// Fixed clip list published as a JSON manifest on IPFS.
pub struct IpfsManifestSource {
    client: reqwest::Client,
    gateway: String,
    manifest_cid: String,
}

impl IpfsManifestSource {
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self {
            client,
            gateway: api.ipfs_gateway.clone(),
            manifest_cid: api.video_list_cid.clone(),
        }
    }
}

#[async_trait]
impl ContentSource for IpfsManifestSource {
    async fn fetch_next_batch(&self) -> Result<Vec<Content>, ContentError> {
        let url = join_url(&self.gateway, &self.manifest_cid)?;
        let list: VideoListResponse = get_json(&self.client, url).await?;
        debug!(clips = list.video_clips.len(), "fetched video manifest");
        Ok(list
            .video_clips
            .into_iter()
            .map(|clip| clip.into_content(&self.gateway))
            .collect())
    }
}

/// Random batch from the API's clip endpoint.
pub struct RandomClipSource {
    client: reqwest::Client,
    base_url: String,
    gateway: String,
}

impl RandomClipSource {
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self {
            client,
            base_url: api.base_url.clone(),
            gateway: api.ipfs_gateway.clone(),
        }
    }
}

#[async_trait]
impl ContentSource for RandomClipSource {
    async fn fetch_next_batch(&self) -> Result<Vec<Content>, ContentError> {
        let url = join_url(&self.base_url, "video-clip-action")?;
        let clips: Vec<VideoClip> = get_json(&self.client, url).await?;
        debug!(clips = clips.len(), "fetched random clips");
        Ok(clips
            .into_iter()
            .map(|clip| clip.into_content(&self.gateway))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(rename = "HttpCode")]
    http_code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<T>,
}

/// Label picker options from the API.
pub struct ApiLabelSource {
    client: reqwest::Client,
    base_url: String,
    limit: u32,
}

impl ApiLabelSource {
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self {
            client,
            base_url: api.base_url.clone(),
            limit: 10,
        }
    }
}

#[async_trait]
impl LabelSource for ApiLabelSource {
    async fn alternative_labels(&self) -> Result<Vec<LabelOption>, ContentError> {
        let mut url = join_url(&self.base_url, "actions/random")?;
        url.query_pairs_mut()
            .append_pair("limit", &self.limit.to_string());
        let envelope: ApiEnvelope<Vec<LabelOption>> = get_json(&self.client, url).await?;
        if envelope.http_code != 200 {
            return Err(ContentError::Status {
                status: envelope.http_code,
                message: envelope.message,
            });
        }
        Ok(envelope.data.unwrap_or_default())
    }
}
