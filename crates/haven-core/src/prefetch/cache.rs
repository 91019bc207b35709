//! Video prefetch cache.
//!
//! Keeps the next few clips resident as local blobs. The queue is drained
//! one item at a time; each completed fetch is inserted and the cache is
//! then trimmed back to `max_cache_size` by evicting the oldest entries.
//! A miss is never an error: callers stream the original URL instead.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::blob::{BlobHandle, BlobStore};
use super::fetcher::MediaFetcher;
use super::progress::{FetchProgress, PreloadProgress, PreloadStatus};
use crate::clock::Clock;
use crate::content::Content;
use crate::error::PrefetchError;
use crate::storage::PrefetchConfig;

#[derive(Debug, Clone)]
struct CacheEntry {
    handle: BlobHandle,
    fetched_at_ms: u64,
    /// Tie-break for entries fetched within the same millisecond.
    seq: u64,
    size: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    queue: VecDeque<Content>,
    progress: HashMap<String, PreloadProgress>,
    in_flight: Option<String>,
    processing: bool,
    connection_speed: Option<f64>,
    next_seq: u64,
}

pub struct PrefetchCache {
    config: PrefetchConfig,
    fetcher: Arc<dyn MediaFetcher>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
    cancel: Mutex<CancellationToken>,
}

impl PrefetchCache {
    pub fn new(
        config: PrefetchConfig,
        fetcher: Arc<dyn MediaFetcher>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            fetcher,
            blobs,
            clock,
            state: Mutex::new(CacheState::default()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Token observed by the current fetch. Cancelling it aborts that fetch
    /// and stops queue processing; the next fetch gets a fresh token.
    pub fn abort_handle(&self) -> CancellationToken {
        self.live_token()
    }

    /// Current token, replaced first if an earlier abort consumed it.
    fn live_token(&self) -> CancellationToken {
        let mut cancel = self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
        cancel.clone()
    }

    // ── Queue ──

    /// Queue items that are neither cached, queued nor in flight, then trim
    /// the queue to `preload_count`. Returns how many were accepted.
    pub fn enqueue(&self, items: &[Content]) -> usize {
        let mut state = self.state();
        let mut added: usize = 0;
        for item in items {
            let known = state.entries.contains_key(&item.id)
                || state.in_flight.as_deref() == Some(item.id.as_str())
                || state.queue.iter().any(|queued| queued.id == item.id);
            if known {
                continue;
            }
            state.queue.push_back(item.clone());
            state
                .progress
                .insert(item.id.clone(), PreloadProgress::pending(&item.id));
            added += 1;
        }

        let keep = self.config.preload_count;
        while state.queue.len() > keep {
            if let Some(dropped) = state.queue.pop_back() {
                state.progress.remove(&dropped.id);
                added = added.saturating_sub(1);
            }
        }
        debug!(added, queued = state.queue.len(), "prefetch queue updated");
        added
    }

    pub fn queued_ids(&self) -> Vec<String> {
        self.state().queue.iter().map(|c| c.id.clone()).collect()
    }

    /// Drain the queue one fetch at a time. Returns the number of items
    /// that landed in the cache. A concurrent call returns 0 immediately.
    pub async fn process_queue(&self) -> usize {
        {
            let mut state = self.state();
            if state.processing {
                return 0;
            }
            state.processing = true;
        }

        let token = self.live_token();
        let mut fetched = 0;
        loop {
            if token.is_cancelled() {
                break;
            }
            let next = self.state().queue.pop_front();
            let Some(item) = next else { break };
            match self.fetch_into_cache(&item, token.clone()).await {
                Ok(_) => fetched += 1,
                Err(PrefetchError::Aborted) => break,
                Err(e) => debug!(content_id = %item.id, error = %e, "prefetch skipped"),
            }
        }

        self.state().processing = false;
        fetched
    }

    /// Fetch `item` now, bypassing the queue. Returns the cached handle
    /// straight away if the item is already resident.
    pub async fn force_preload(&self, item: &Content) -> Result<BlobHandle, PrefetchError> {
        if let Some(handle) = self.get_preloaded_video(&item.id) {
            return Ok(handle);
        }
        self.state().queue.retain(|queued| queued.id != item.id);
        self.fetch_into_cache(item, self.live_token()).await
    }

    /// Drop queued items and abort the in-flight fetch.
    pub fn clear_queue(&self) {
        {
            let mut state = self.state();
            let dropped: Vec<Content> = state.queue.drain(..).collect();
            for item in dropped {
                state.progress.remove(&item.id);
            }
        }
        let mut cancel = self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cancel.cancel();
        *cancel = CancellationToken::new();
    }

    // ── Lookup ──

    /// Lookup only; never starts a fetch.
    pub fn get_preloaded_video(&self, content_id: &str) -> Option<BlobHandle> {
        self.state()
            .entries
            .get(content_id)
            .map(|entry| entry.handle.clone())
    }

    pub fn is_preloaded(&self, content_id: &str) -> bool {
        self.state().entries.contains_key(content_id)
    }

    pub fn progress(&self, content_id: &str) -> Option<PreloadProgress> {
        self.state().progress.get(content_id).cloned()
    }

    pub fn all_progress(&self) -> Vec<PreloadProgress> {
        let mut all: Vec<_> = self.state().progress.values().cloned().collect();
        all.sort_by(|a, b| a.content_id.cmp(&b.content_id));
        all
    }

    /// Resident ids, oldest first.
    pub fn resident_ids(&self) -> Vec<String> {
        let state = self.state();
        let mut entries: Vec<_> = state.entries.iter().collect();
        entries.sort_by_key(|(_, e)| (e.fetched_at_ms, e.seq));
        entries.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resident_bytes(&self) -> usize {
        self.state().entries.values().map(|e| e.size).sum()
    }

    /// Bytes per second seen on the most recent fetch.
    pub fn connection_speed(&self) -> Option<f64> {
        self.state().connection_speed
    }

    pub fn is_low_bandwidth(&self) -> bool {
        self.connection_speed()
            .map(|speed| speed < self.config.low_bandwidth_threshold as f64)
            .unwrap_or(false)
    }

    // ── Teardown ──

    /// Abort fetches and release every resident blob.
    pub fn clear(&self) {
        self.clear_queue();
        let entries: Vec<(String, CacheEntry)> = {
            let mut state = self.state();
            state.progress.clear();
            state.entries.drain().collect()
        };
        for (id, entry) in &entries {
            self.release(id, entry);
        }
        info!(released = entries.len(), "prefetch cache cleared");
    }

    // ── Internal ──

    async fn fetch_into_cache(
        &self,
        item: &Content,
        token: CancellationToken,
    ) -> Result<BlobHandle, PrefetchError> {
        if item.url.is_empty() {
            let err = PrefetchError::MissingUrl(item.id.clone());
            self.mark_failed(&item.id, &err);
            return Err(err);
        }

        {
            let mut state = self.state();
            state.in_flight = Some(item.id.clone());
            let progress = state
                .progress
                .entry(item.id.clone())
                .or_insert_with(|| PreloadProgress::pending(&item.id));
            progress.status = PreloadStatus::Loading;
        }

        let on_progress = |chunk: FetchProgress| {
            let mut state = self.state();
            state.connection_speed = Some(chunk.speed_bytes_per_sec);
            if let Some(progress) = state.progress.get_mut(&item.id) {
                progress.update(chunk);
            }
        };
        let result = self.fetcher.fetch(&item.url, token, &on_progress).await;
        self.state().in_flight = None;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(PrefetchError::Aborted) => {
                debug!(content_id = %item.id, "prefetch aborted");
                self.state().progress.remove(&item.id);
                return Err(PrefetchError::Aborted);
            }
            Err(e) => {
                self.mark_failed(&item.id, &e);
                return Err(e);
            }
        };

        let handle = match self.blobs.create(&item.id, &bytes) {
            Ok(handle) => handle,
            Err(e) => {
                let err = PrefetchError::Blob(e);
                self.mark_failed(&item.id, &err);
                return Err(err);
            }
        };

        let evicted = {
            let mut state = self.state();
            let seq = state.next_seq;
            state.next_seq += 1;
            let entry = CacheEntry {
                handle: handle.clone(),
                fetched_at_ms: self.clock.now_ms(),
                seq,
                size: bytes.len(),
            };
            let replaced = state.entries.insert(item.id.clone(), entry);
            if let Some(progress) = state.progress.get_mut(&item.id) {
                progress.complete();
            }
            let mut evicted = self.evict_over_limit(&mut state);
            evicted.extend(replaced.map(|old| (item.id.clone(), old)));
            evicted
        };
        for (id, entry) in &evicted {
            self.release(id, entry);
        }

        debug!(content_id = %item.id, size = bytes.len(), "prefetch cached");
        Ok(handle)
    }

    fn evict_over_limit(&self, state: &mut CacheState) -> Vec<(String, CacheEntry)> {
        let mut evicted = Vec::new();
        while state.entries.len() > self.config.max_cache_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.fetched_at_ms, e.seq))
                .map(|(id, _)| id.clone());
            let Some(id) = oldest else { break };
            if let Some(entry) = state.entries.remove(&id) {
                state.progress.remove(&id);
                evicted.push((id, entry));
            }
        }
        evicted
    }

    fn mark_failed(&self, content_id: &str, err: &PrefetchError) {
        warn!(content_id, error = %err, "prefetch failed");
        let mut state = self.state();
        state.entries.remove(content_id);
        state
            .progress
            .entry(content_id.to_string())
            .or_insert_with(|| PreloadProgress::pending(content_id))
            .fail(err.to_string());
    }

    fn release(&self, content_id: &str, entry: &CacheEntry) {
        debug!(content_id, handle = %entry.handle, "releasing blob");
        if let Err(e) = self.blobs.release(&entry.handle) {
            warn!(content_id, error = %e, "failed to release blob");
        }
    }
}

impl Drop for PrefetchCache {
    fn drop(&mut self) {
        self.cancel
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cancel();
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entries: Vec<_> = state.entries.drain().collect();
        for (id, entry) in &entries {
            self.release(id, entry);
        }
    }
}
