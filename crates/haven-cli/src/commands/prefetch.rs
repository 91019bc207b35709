use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use haven_core::prefetch::{DiskBlobStore, HttpMediaFetcher};
use haven_core::storage::data_dir;
use haven_core::{Config, Content, MediaKind, PrefetchCache, SystemClock};
use serde_json::json;

use super::{http_client, print_json, runtime, CliResult};

#[derive(Args)]
pub struct PrefetchArgs {
    /// Clip ids (IPFS CIDs), in display order
    #[arg(required = true)]
    pub content_ids: Vec<String>,
}

pub fn run(args: PrefetchArgs) -> CliResult {
    let config = Config::load()?;
    let timeout = config.prefetch.fetch_timeout_secs;
    let fetcher = HttpMediaFetcher::new(http_client(timeout)?, Duration::from_secs(timeout));
    let blobs = Arc::new(DiskBlobStore::open(data_dir()?.join("media-cache"))?);
    let cache = PrefetchCache::new(
        config.prefetch.clone(),
        Arc::new(fetcher),
        blobs,
        Arc::new(SystemClock),
    );

    let gateway = config.api.ipfs_gateway.trim_end_matches('/');
    let items: Vec<Content> = args
        .content_ids
        .iter()
        .map(|id| Content {
            id: id.clone(),
            url: format!("{gateway}/{id}"),
            kind: MediaKind::Video,
            points_value: 0,
            left_action_id: None,
            right_action_id: None,
        })
        .collect();

    // The first clip is the one on screen; the rest go through the queue.
    let rt = runtime()?;
    let (current, upcoming) = items.split_first().ok_or("no content ids given")?;
    if let Err(e) = rt.block_on(cache.force_preload(current)) {
        tracing::warn!(content_id = %current.id, error = %e, "current clip will stream directly");
    }
    cache.enqueue(upcoming);
    rt.block_on(cache.process_queue());

    let summary = report(&cache);
    cache.clear();
    print_json(&summary)
}

/// What the run fetched. The cache does not outlive the command, so only
/// ids and sizes are reported, never blob paths.
fn report(cache: &PrefetchCache) -> serde_json::Value {
    json!({
        "fetched": cache.resident_ids(),
        "fetchedBytes": cache.resident_bytes(),
        "progress": cache.all_progress(),
        "connectionSpeed": cache.connection_speed(),
        "lowBandwidth": cache.is_low_bandwidth(),
    })
}
