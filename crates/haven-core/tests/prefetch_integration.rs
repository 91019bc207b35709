//! Prefetch cache against a mock media server and an on-disk blob store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use haven_core::prefetch::{DiskBlobStore, HttpMediaFetcher};
use haven_core::storage::PrefetchConfig;
use haven_core::{BlobStore, Content, ManualClock, MediaKind, PrefetchCache, PreloadStatus};

fn clip(server: &mockito::ServerGuard, id: &str) -> Content {
    Content {
        id: id.into(),
        url: format!("{}/ipfs/{id}", server.url()),
        kind: MediaKind::Video,
        points_value: 1,
        left_action_id: None,
        right_action_id: None,
    }
}

async fn serve(server: &mut mockito::ServerGuard, id: &str) {
    server
        .mock("GET", format!("/ipfs/{id}").as_str())
        .with_status(200)
        .with_body(format!("video bytes for {id}"))
        .create_async()
        .await;
}

struct Setup {
    cache: PrefetchCache,
    blobs: Arc<DiskBlobStore>,
    clock: Arc<ManualClock>,
    _dir: tempfile::TempDir,
}

fn setup(preload_count: usize) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(DiskBlobStore::open(dir.path().join("media-cache")).unwrap());
    let clock = Arc::new(ManualClock::new(0));
    let config = PrefetchConfig {
        preload_count,
        ..PrefetchConfig::default()
    };
    let fetcher = HttpMediaFetcher::new(reqwest::Client::new(), Duration::from_secs(10));
    let cache = PrefetchCache::new(config, Arc::new(fetcher), blobs.clone(), clock.clone());
    Setup {
        cache,
        blobs,
        clock,
        _dir: dir,
    }
}

#[tokio::test]
async fn eight_items_leave_five_most_recent() {
    let mut server = mockito::Server::new_async().await;
    let ids: Vec<String> = (0..8).map(|i| format!("clip{i}")).collect();
    for id in &ids {
        serve(&mut server, id).await;
    }

    let s = setup(8);
    let items: Vec<Content> = ids.iter().map(|id| clip(&server, id)).collect();
    assert_eq!(s.cache.enqueue(&items), 8);

    let mut handles = Vec::new();
    for item in &items {
        s.clock.advance(100);
        handles.push(s.cache.force_preload(item).await.unwrap());
    }

    assert_eq!(s.cache.len(), 5);
    assert_eq!(s.blobs.live_count(), 5);
    for (i, id) in ids.iter().enumerate() {
        let resident = s.cache.get_preloaded_video(id);
        if i < 3 {
            assert!(resident.is_none());
            assert!(!PathBuf::from(handles[i].as_str()).exists());
        } else {
            let handle = resident.unwrap();
            let bytes = std::fs::read(handle.as_str()).unwrap();
            assert_eq!(bytes, format!("video bytes for {id}").into_bytes());
        }
    }
}

#[tokio::test]
async fn draining_the_queue_past_capacity_keeps_five_files() {
    let mut server = mockito::Server::new_async().await;
    let ids: Vec<String> = (0..8).map(|i| format!("q{i}")).collect();
    for id in &ids {
        serve(&mut server, id).await;
    }

    let s = setup(2);
    for pair in ids.chunks(2) {
        let items: Vec<Content> = pair.iter().map(|id| clip(&server, id)).collect();
        assert_eq!(s.cache.enqueue(&items), 2);
        s.clock.advance(100);
        assert_eq!(s.cache.process_queue().await, 2);
    }

    assert_eq!(s.cache.len(), 5);
    assert_eq!(s.blobs.live_count(), 5);
    let files = std::fs::read_dir(s.blobs.dir()).unwrap().count();
    assert_eq!(files, 5);
    for id in &ids[..3] {
        assert!(s.cache.get_preloaded_video(id).is_none());
    }
    for id in &ids[3..] {
        assert!(s.cache.is_preloaded(id));
    }
}

#[tokio::test]
async fn queue_processing_reports_progress_and_failures() {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "good").await;
    server
        .mock("GET", "/ipfs/bad")
        .with_status(500)
        .create_async()
        .await;

    let s = setup(3);
    s.cache
        .enqueue(&[clip(&server, "bad"), clip(&server, "good")]);
    assert_eq!(s.cache.process_queue().await, 1);

    let good = s.cache.progress("good").unwrap();
    assert_eq!(good.status, PreloadStatus::Completed);
    assert_eq!(good.percent_complete, 100.0);
    assert!(s.cache.connection_speed().is_some());

    let bad = s.cache.progress("bad").unwrap();
    assert_eq!(bad.status, PreloadStatus::Error);
    assert!(s.cache.get_preloaded_video("bad").is_none());
    assert!(s.cache.queued_ids().is_empty());
}

#[tokio::test]
async fn teardown_deletes_blob_files() {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "a").await;
    serve(&mut server, "b").await;

    let s = setup(2);
    let a = s.cache.force_preload(&clip(&server, "a")).await.unwrap();
    let b = s.cache.force_preload(&clip(&server, "b")).await.unwrap();
    assert!(PathBuf::from(a.as_str()).exists());

    drop(s.cache);
    assert_eq!(s.blobs.live_count(), 0);
    assert!(!PathBuf::from(a.as_str()).exists());
    assert!(!PathBuf::from(b.as_str()).exists());
}
