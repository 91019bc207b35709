//! Persistent session store.
//!
//! Single source of truth for progression: the pending classification batch
//! plus one [`SessionCounters`] record. Every read-modify-write of the
//! counters runs in one SQLite transaction behind a mutex, so concurrent
//! `record_classification` calls never interleave.
//!
//! Reads never fail: if the store cannot be read they log and return the
//! zero-value default.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{ClassificationRecord, SessionCounters};
use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;
use crate::storage::{Config, Database};

const COUNTERS_KEY: &str = "session_counters";
const SESSION_ID_KEY: &str = "session_id";
const LAST_SUBMITTED_KEY: &str = "last_submitted";
const SESSION_ID_PREFIX: &str = "haven-";

/// Pending records read for one submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBatch {
    pub records: Vec<ClassificationRecord>,
    /// Newest record id covered by the snapshot.
    through_id: Option<i64>,
}

impl PendingBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Store-level policy, derived from [`Config`].
#[derive(Debug, Clone, Copy)]
struct StorePolicy {
    wallet_required_at: u32,
    clear_wallet_required_on_submit: bool,
}

pub struct SessionStore {
    db: Mutex<Database>,
    policy: StorePolicy,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Wrap an opened database and apply the load policy.
    ///
    /// With `session.reset_on_load` every construction starts a new session:
    /// fresh id, zeroed counters. Pending classifications are kept.
    pub fn new(db: Database, config: &Config, clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        let store = Self {
            db: Mutex::new(db),
            policy: StorePolicy {
                wallet_required_at: config.gating.hard_prompt_threshold,
                clear_wallet_required_on_submit: config.session.clear_wallet_required_on_submit,
            },
            clock,
        };

        if config.session.reset_on_load {
            store.reset_session()?;
        } else if store.session_id().is_none() {
            store.kv_set(SESSION_ID_KEY, &new_session_id())?;
        }
        Ok(store)
    }

    /// Open the default on-disk store.
    pub fn open(config: &Config) -> Result<Self, StorageError> {
        Self::new(Database::open()?, config, Arc::new(SystemClock))
    }

    /// In-memory store on the wall clock.
    pub fn in_memory(config: &Config) -> Result<Self, StorageError> {
        Self::new(Database::open_memory()?, config, Arc::new(SystemClock))
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_counters(conn: &Connection) -> Result<SessionCounters, StorageError> {
        match Database::kv_get_in(conn, COUNTERS_KEY)? {
            None => Ok(SessionCounters::default()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                key: COUNTERS_KEY.into(),
                message: e.to_string(),
            }),
        }
    }

    fn write_counters(conn: &Connection, counters: &SessionCounters) -> Result<(), StorageError> {
        let raw = serde_json::to_string(counters).map_err(|e| StorageError::Corrupt {
            key: COUNTERS_KEY.into(),
            message: e.to_string(),
        })?;
        Database::kv_set_in(conn, COUNTERS_KEY, &raw)
    }

    /// Counters for a write path; a corrupt record is replaced rather than
    /// blocking progression.
    fn counters_for_update(conn: &Connection) -> Result<SessionCounters, StorageError> {
        match Self::read_counters(conn) {
            Err(StorageError::Corrupt { key, message }) => {
                warn!(%key, %message, "discarding corrupt session counters");
                Ok(SessionCounters::default())
            }
            other => other,
        }
    }

    /// Append a record and bump the clip count in one transaction.
    ///
    /// Returns the updated counters so callers can react to a newly crossed
    /// threshold without re-reading.
    pub fn record_classification(
        &self,
        content_id: &str,
        action_id: &str,
    ) -> Result<SessionCounters, StorageError> {
        let record = ClassificationRecord {
            content_id: content_id.to_string(),
            selected_action_id: action_id.to_string(),
            timestamp: self.clock.now_ms(),
        };
        let required_at = self.policy.wallet_required_at;

        let (counters, crossed) = self.db().transaction(|conn| {
            Database::insert_classification(conn, &record)?;
            let mut counters = Self::counters_for_update(conn)?;
            let crossed = counters.register_classification(required_at);
            Self::write_counters(conn, &counters)?;
            Ok((counters, crossed))
        })?;

        debug!(
            content_id,
            action_id,
            clip_count = counters.clip_count,
            "classification recorded"
        );
        if crossed {
            info!(clip_count = counters.clip_count, "wallet now required");
        }
        Ok(counters)
    }

    /// Pending records, oldest first.
    pub fn classifications(&self) -> Vec<ClassificationRecord> {
        self.try_classifications().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read classifications, using empty batch");
            Vec::new()
        })
    }

    /// Like [`classifications`](Self::classifications) but surfaces read failures.
    pub fn try_classifications(&self) -> Result<Vec<ClassificationRecord>, StorageError> {
        self.db().list_classifications()
    }

    pub fn pending_count(&self) -> u64 {
        self.db().count_classifications().unwrap_or_else(|e| {
            warn!(error = %e, "failed to count classifications");
            0
        })
    }

    /// Snapshot of the pending records, bounded by the newest id read.
    pub fn pending_batch(&self) -> Result<PendingBatch, StorageError> {
        let db = self.db();
        Ok(PendingBatch {
            records: db.list_classifications()?,
            through_id: db.last_classification_id()?,
        })
    }

    /// Empty the batch, stamp `last_submitted`, zero the clip count and
    /// reset both prompt latches.
    pub fn clear_classifications(&self) -> Result<SessionCounters, StorageError> {
        self.clear_through(None)
    }

    /// Clear only the records in `batch`. Records added after the snapshot
    /// stay pending and keep counting towards the clip count.
    pub fn clear_submitted(&self, batch: &PendingBatch) -> Result<SessionCounters, StorageError> {
        self.clear_through(Some(batch.through_id.unwrap_or(0)))
    }

    fn clear_through(&self, through_id: Option<i64>) -> Result<SessionCounters, StorageError> {
        let now = self.clock.now_ms();
        let clear_required = self.policy.clear_wallet_required_on_submit;

        let (removed, remaining, counters) = self.db().transaction(|conn| {
            let removed = Database::delete_classifications(conn, through_id)?;
            let remaining = Database::count_classifications_in(conn)?;
            Database::kv_set_in(conn, LAST_SUBMITTED_KEY, &now.to_string())?;
            let mut counters = Self::counters_for_update(conn)?;
            let kept = counters
                .clip_count
                .saturating_sub(removed as u32)
                .min(remaining as u32);
            counters.reset_progress(clear_required);
            counters.clip_count = kept;
            Self::write_counters(conn, &counters)?;
            Ok((removed, remaining, counters))
        })?;

        info!(removed, remaining, "classifications cleared");
        Ok(counters)
    }

    pub fn counters(&self) -> SessionCounters {
        let db = self.db();
        Self::read_counters(db.conn()).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read session counters, using defaults");
            SessionCounters::default()
        })
    }

    pub fn clip_count(&self) -> u32 {
        self.counters().clip_count
    }

    pub fn was_wallet_prompted(&self) -> bool {
        self.counters().wallet_prompted()
    }

    pub fn was_betting_prompted(&self) -> bool {
        self.counters().betting_prompted()
    }

    pub fn is_wallet_required(&self) -> bool {
        self.counters().wallet_required
    }

    pub fn set_wallet_prompted(&self) -> Result<SessionCounters, StorageError> {
        self.update_counters(|c| c.wallet_prompt.latch())
    }

    pub fn set_betting_prompted(&self) -> Result<SessionCounters, StorageError> {
        self.update_counters(|c| c.betting_prompt.latch())
    }

    fn update_counters(
        &self,
        f: impl FnOnce(&mut SessionCounters),
    ) -> Result<SessionCounters, StorageError> {
        self.db().transaction(|conn| {
            let mut counters = Self::counters_for_update(conn)?;
            f(&mut counters);
            Self::write_counters(conn, &counters)?;
            Ok(counters)
        })
    }

    /// Start a new session: new id, zeroed counters and latches,
    /// `wallet_required` cleared. Pending classifications are kept.
    pub fn reset_session(&self) -> Result<String, StorageError> {
        let id = new_session_id();
        self.db().transaction(|conn| {
            Database::kv_set_in(conn, SESSION_ID_KEY, &id)?;
            Self::write_counters(conn, &SessionCounters::default())
        })?;
        info!(session_id = %id, "session started");
        Ok(id)
    }

    pub fn session_id(&self) -> Option<String> {
        self.db().kv_get(SESSION_ID_KEY).ok().flatten()
    }

    /// Epoch ms of the last successful clear, if any.
    pub fn last_submitted(&self) -> Option<u64> {
        self.db()
            .kv_get(LAST_SUBMITTED_KEY)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
    }

    /// Raw kv access for collaborators that persist alongside the session.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.db().kv_get(key)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db().kv_set(key, value)
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.db().kv_delete(key)
    }
}

fn new_session_id() -> String {
    format!("{}{}", SESSION_ID_PREFIX, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_with(config: &Config) -> (SessionStore, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let store =
            SessionStore::new(Database::open_memory().unwrap(), config, Arc::new(clock.clone()))
                .unwrap();
        (store, clock)
    }

    #[test]
    fn absent_state_reads_as_zero() {
        let (store, _) = store_with(&Config::default());
        assert_eq!(store.clip_count(), 0);
        assert!(store.classifications().is_empty());
        assert!(!store.was_wallet_prompted());
        assert!(store.last_submitted().is_none());
    }

    #[test]
    fn record_returns_updated_counters() {
        let (store, clock) = store_with(&Config::default());
        let counters = store.record_classification("clip-1", "jump").unwrap();
        assert_eq!(counters.clip_count, 1);

        let records = store.classifications();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content_id, "clip-1");
        assert_eq!(records[0].selected_action_id, "jump");
        assert_eq!(records[0].timestamp, clock.now_ms());
    }

    #[test]
    fn wallet_required_after_fifty() {
        let (store, _) = store_with(&Config::default());
        for i in 0..49 {
            let counters = store.record_classification(&format!("c{i}"), "a").unwrap();
            assert!(!counters.wallet_required);
        }
        let counters = store.record_classification("c49", "a").unwrap();
        assert_eq!(counters.clip_count, 50);
        assert!(counters.wallet_required);
        assert!(store.is_wallet_required());
    }

    #[test]
    fn latch_survives_further_classifications() {
        let (store, _) = store_with(&Config::default());
        store.set_wallet_prompted().unwrap();
        store.record_classification("c", "a").unwrap();
        assert!(store.was_wallet_prompted());
    }

    #[test]
    fn clear_resets_progress_and_stamps() {
        let (store, clock) = store_with(&Config::default());
        for i in 0..3 {
            store.record_classification(&format!("c{i}"), "a").unwrap();
        }
        store.set_wallet_prompted().unwrap();
        store.set_betting_prompted().unwrap();
        clock.advance(5_000);

        let counters = store.clear_classifications().unwrap();
        assert_eq!(counters.clip_count, 0);
        assert!(!counters.wallet_prompted());
        assert!(!counters.betting_prompted());
        assert!(store.classifications().is_empty());
        assert_eq!(store.last_submitted(), Some(clock.now_ms()));

        // Clearing an empty store is harmless.
        assert_eq!(store.clear_classifications().unwrap().clip_count, 0);
    }

    #[test]
    fn clear_submitted_keeps_later_records() {
        let (store, _) = store_with(&Config::default());
        for i in 0..3 {
            store.record_classification(&format!("c{i}"), "a").unwrap();
        }
        store.set_wallet_prompted().unwrap();
        let batch = store.pending_batch().unwrap();
        assert_eq!(batch.len(), 3);

        store.record_classification("late", "a").unwrap();
        let counters = store.clear_submitted(&batch).unwrap();

        let left = store.classifications();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].content_id, "late");
        assert_eq!(counters.clip_count, 1);
        assert!(!counters.wallet_prompted());
    }

    #[test]
    fn clear_submitted_with_empty_snapshot_removes_nothing() {
        let (store, _) = store_with(&Config::default());
        let batch = store.pending_batch().unwrap();
        assert!(batch.is_empty());
        store.record_classification("c", "a").unwrap();
        assert_eq!(store.clear_submitted(&batch).unwrap().clip_count, 1);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn wallet_required_kept_on_clear_by_default() {
        let (store, _) = store_with(&Config::default());
        for i in 0..50 {
            store.record_classification(&format!("c{i}"), "a").unwrap();
        }
        let counters = store.clear_classifications().unwrap();
        assert!(counters.wallet_required);
    }

    #[test]
    fn wallet_required_cleared_when_configured() {
        let mut config = Config::default();
        config.session.clear_wallet_required_on_submit = true;
        let (store, _) = store_with(&config);
        for i in 0..50 {
            store.record_classification(&format!("c{i}"), "a").unwrap();
        }
        assert!(!store.clear_classifications().unwrap().wallet_required);
    }

    #[test]
    fn reset_on_load_keeps_pending_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("haven.db");
        let config = Config::default();

        let first_id = {
            let store =
                SessionStore::new(Database::open_at(&path).unwrap(), &config, Arc::new(SystemClock))
                    .unwrap();
            for i in 0..30 {
                store.record_classification(&format!("c{i}"), "a").unwrap();
            }
            store.session_id().unwrap()
        };

        let store =
            SessionStore::new(Database::open_at(&path).unwrap(), &config, Arc::new(SystemClock))
                .unwrap();
        assert_eq!(store.clip_count(), 0);
        assert_eq!(store.classifications().len(), 30);
        assert_ne!(store.session_id().unwrap(), first_id);
        assert!(store.session_id().unwrap().starts_with(SESSION_ID_PREFIX));
    }

    #[test]
    fn persistent_sessions_survive_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("haven.db");
        let mut config = Config::default();
        config.session.reset_on_load = false;

        let first_id = {
            let store =
                SessionStore::new(Database::open_at(&path).unwrap(), &config, Arc::new(SystemClock))
                    .unwrap();
            store.record_classification("c", "a").unwrap();
            store.set_wallet_prompted().unwrap();
            store.session_id().unwrap()
        };

        let store =
            SessionStore::new(Database::open_at(&path).unwrap(), &config, Arc::new(SystemClock))
                .unwrap();
        assert_eq!(store.clip_count(), 1);
        assert!(store.was_wallet_prompted());
        assert_eq!(store.session_id().unwrap(), first_id);
    }

    #[test]
    fn corrupt_counters_fall_back_to_default() {
        let (store, _) = store_with(&Config::default());
        store.kv_set(COUNTERS_KEY, "{not json").unwrap();
        assert_eq!(store.clip_count(), 0);
        assert_eq!(store.record_classification("c", "a").unwrap().clip_count, 1);
    }

    #[test]
    fn concurrent_records_do_not_lose_updates() {
        let (store, _) = store_with(&Config::default());
        let store = Arc::new(store);
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
        assert_eq!(store.pending_count(), 100);
    }
}
