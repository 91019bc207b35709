//! Integration tests for the persistent session store.
//!
//! Covers counter monotonicity, clearing, latch lifetime, the record
//! round-trip and the load policy on an on-disk database.

use std::sync::Arc;

use haven_core::storage::Database;
use haven_core::{Config, ManualClock, SessionStore, SystemClock};
use proptest::prelude::*;

fn store() -> SessionStore {
    SessionStore::in_memory(&Config::default()).unwrap()
}

proptest! {
    #[test]
    fn clip_count_grows_by_one_per_record(before in 0u32..30, n in 0u32..40) {
        let store = store();
        for i in 0..before {
            store.record_classification(&format!("pre-{i}"), "a").unwrap();
        }
        let start = store.clip_count();
        for i in 0..n {
            store.record_classification(&format!("c-{i}"), "a").unwrap();
        }
        prop_assert_eq!(store.clip_count(), start + n);
        prop_assert_eq!(store.classifications().len() as u32, before + n);
    }
}

#[test]
fn clear_is_total_and_idempotent() {
    let store = store();
    for i in 0..12 {
        store.record_classification(&format!("c{i}"), "left").unwrap();
    }
    store.clear_classifications().unwrap();
    assert_eq!(store.clip_count(), 0);
    assert!(store.classifications().is_empty());

    store.clear_classifications().unwrap();
    assert_eq!(store.clip_count(), 0);
    assert!(store.classifications().is_empty());
    assert!(store.last_submitted().is_some());
}

#[test]
fn wallet_latch_survives_records_until_clear() {
    let store = store();
    store.record_classification("a", "x").unwrap();
    store.set_wallet_prompted().unwrap();
    store.record_classification("b", "x").unwrap();
    assert!(store.was_wallet_prompted());

    store.clear_classifications().unwrap();
    assert!(!store.was_wallet_prompted());

    store.set_wallet_prompted().unwrap();
    store.reset_session().unwrap();
    assert!(!store.was_wallet_prompted());
}

#[test]
fn record_round_trips_with_wall_clock_timestamp() {
    let store = SessionStore::new(
        Database::open_memory().unwrap(),
        &Config::default(),
        Arc::new(SystemClock),
    )
    .unwrap();

    let before = chrono::Utc::now().timestamp_millis() as u64;
    store.record_classification("clip-9", "action-3").unwrap();
    let after = chrono::Utc::now().timestamp_millis() as u64;

    let records = store.classifications();
    let record = records.last().unwrap();
    assert_eq!(record.content_id, "clip-9");
    assert_eq!(record.selected_action_id, "action-3");
    assert!(record.timestamp >= before && record.timestamp <= after);
}

#[test]
fn records_keep_insertion_order() {
    let clock = Arc::new(ManualClock::new(5_000));
    let store = SessionStore::new(Database::open_memory().unwrap(), &Config::default(), clock.clone())
        .unwrap();
    for id in ["first", "second", "third"] {
        store.record_classification(id, "a").unwrap();
        clock.advance(1);
    }
    let ids: Vec<_> = store
        .classifications()
        .into_iter()
        .map(|r| r.content_id)
        .collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[test]
fn load_policy_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("haven.db");

    let mut persistent = Config::default();
    persistent.session.reset_on_load = false;

    let first = SessionStore::new(
        Database::open_at(&path).unwrap(),
        &persistent,
        Arc::new(SystemClock),
    )
    .unwrap();
    for i in 0..30 {
        first.record_classification(&format!("c{i}"), "a").unwrap();
    }
    let session_id = first.session_id();
    drop(first);

    let reopened = SessionStore::new(
        Database::open_at(&path).unwrap(),
        &persistent,
        Arc::new(SystemClock),
    )
    .unwrap();
    assert_eq!(reopened.clip_count(), 30);
    assert_eq!(reopened.session_id(), session_id);
    drop(reopened);

    // Default policy: every load starts a new session but keeps the batch.
    let fresh = SessionStore::new(
        Database::open_at(&path).unwrap(),
        &Config::default(),
        Arc::new(SystemClock),
    )
    .unwrap();
    assert_eq!(fresh.clip_count(), 0);
    assert_ne!(fresh.session_id(), session_id);
    assert_eq!(fresh.classifications().len(), 30);
}

#[test]
fn concurrent_records_do_not_interleave() {
    let store = Arc::new(store());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..25 {
                    store
                        .record_classification(&format!("t{t}-{i}"), "a")
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.clip_count(), 100);
    assert!(store.is_wallet_required());
}
