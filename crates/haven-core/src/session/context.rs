//! Session context.
//!
//! One constructed object owns everything a running session needs: the
//! store, the policy config, reward and bet state, the gating monitor and
//! the wallet collaborator. Components get it by reference; nothing here is
//! global. State changes are announced to an explicit observer list.
//!
//! Events are collected while locks are held and delivered after they are
//! released, so a listener may call back into the context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::store::{PendingBatch, SessionStore};
use super::types::{RewardState, SessionCounters};
use crate::auth::WalletConnection;
use crate::betting::{BetAccrualEngine, FrameScheduler};
use crate::clock::Clock;
use crate::content::{Content, SwipeDirection};
use crate::error::{AuthError, StorageError};
use crate::events::Event;
use crate::gating::{GatingDecision, GatingMonitor, GatingPolicy};
use crate::storage::Config;

const REWARD_KEY: &str = "reward_state";

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Result of one swipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassifyOutcome {
    Recorded {
        action_id: String,
        counters: SessionCounters,
        reward: RewardState,
        betting_unlocked: bool,
    },
    /// Navigation is blocked until a wallet connects; nothing was recorded.
    Blocked { decision: GatingDecision },
    /// The clip offers no action for that direction.
    NoAction,
}

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: Option<String>,
    pub counters: SessionCounters,
    pub pending: u64,
    pub reward: RewardState,
    pub remaining_until_required: u32,
    pub can_submit: bool,
    pub decision: GatingDecision,
    pub bet_amount: u64,
    pub wallet_address: Option<String>,
    pub last_submitted: Option<u64>,
}

pub struct SessionContext {
    store: Arc<SessionStore>,
    config: Config,
    clock: Arc<dyn Clock>,
    wallet: Arc<dyn WalletConnection>,
    reward: Mutex<RewardState>,
    bet: Mutex<BetAccrualEngine>,
    gating: Mutex<GatingMonitor>,
    observers: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionContext {
    pub fn new(
        store: Arc<SessionStore>,
        config: Config,
        wallet: Arc<dyn WalletConnection>,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Self {
        let reward = load_reward(&store);
        let mut bet = BetAccrualEngine::new(config.betting.clone(), Arc::clone(&clock), scheduler);
        bet.set_balance(reward.points);
        let gating = GatingMonitor::new(
            GatingPolicy::from(&config.gating),
            config.gating.reevaluate_interval_ms,
        );

        Self {
            store,
            config,
            clock,
            wallet,
            reward: Mutex::new(reward),
            bet: Mutex::new(bet),
            gating: Mutex::new(gating),
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    // ── Accessors ──

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn wallet(&self) -> &dyn WalletConnection {
        self.wallet.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn reward(&self) -> RewardState {
        *lock(&self.reward)
    }

    /// Replace the reward state, e.g. with points fetched from a profile.
    pub fn set_reward(&self, reward: RewardState) -> Result<(), StorageError> {
        *lock(&self.reward) = reward;
        save_reward(&self.store, &reward)?;
        let event = lock(&self.bet).set_balance(reward.points);
        self.publish_all(event);
        Ok(())
    }

    // ── Observers ──

    pub fn subscribe(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.observers).push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn publish(&self, event: &Event) {
        let listeners: Vec<Listener> = lock(&self.observers)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    fn publish_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.publish(&event);
        }
    }

    // ── Classification ──

    /// Record the action bound to `direction` on `content`.
    pub fn classify(
        &self,
        content: &Content,
        direction: SwipeDirection,
    ) -> Result<ClassifyOutcome, StorageError> {
        match content.action_for(direction) {
            Some(action_id) => self.classify_as(content, action_id),
            None => {
                warn!(content_id = %content.id, ?direction, "no action bound to direction");
                Ok(ClassifyOutcome::NoAction)
            }
        }
    }

    /// Record an explicit action, e.g. one picked from the label list.
    pub fn classify_as(
        &self,
        content: &Content,
        action_id: &str,
    ) -> Result<ClassifyOutcome, StorageError> {
        let decision = self.gating_decision();
        if decision.block_navigation {
            debug!(content_id = %content.id, "classification blocked until wallet connects");
            return Ok(ClassifyOutcome::Blocked { decision });
        }

        let mut counters = self.store.record_classification(&content.id, action_id)?;
        let at = self.clock.now_utc();
        let mut events = vec![Event::ClassificationRecorded {
            content_id: content.id.clone(),
            action_id: action_id.to_string(),
            points_awarded: content.points_value,
            at,
        }];

        let reward = {
            let mut reward = lock(&self.reward);
            reward.award(content.points_value);
            *reward
        };
        if let Err(e) = save_reward(&self.store, &reward) {
            warn!(error = %e, "failed to persist reward state");
        }

        {
            let mut bet = lock(&self.bet);
            events.extend(bet.reset());
            events.extend(bet.set_balance(reward.points));
        }

        let betting_unlocked = counters.clip_count >= self.config.gating.betting_unlock_threshold
            && !counters.betting_prompted();
        if betting_unlocked {
            counters = self.store.set_betting_prompted()?;
            info!(clip_count = counters.clip_count, "betting unlocked");
            events.push(Event::BettingUnlocked {
                clip_count: counters.clip_count,
                at,
            });
        }

        events.push(Event::CountersChanged { counters, at });
        events.extend(self.notify_gating(&counters));
        self.publish_all(events);

        Ok(ClassifyOutcome::Recorded {
            action_id: action_id.to_string(),
            counters,
            reward,
            betting_unlocked,
        })
    }

    // ── Gating ──

    /// Current decision from the store, without touching the monitor.
    pub fn gating_decision(&self) -> GatingDecision {
        lock(&self.gating)
            .policy()
            .evaluate(&self.store.counters(), self.wallet.is_connected())
    }

    /// Periodic reconciliation; publishes `GatingChanged` on change.
    pub fn poll_gating(&self) -> Option<GatingDecision> {
        let now = self.clock.now_ms();
        let connected = self.wallet.is_connected();
        let mut clip_count = 0;
        let decision = lock(&self.gating).poll(
            now,
            || {
                let counters = self.store.counters();
                clip_count = counters.clip_count;
                counters
            },
            connected,
        )?;
        self.publish(&Event::GatingChanged {
            decision,
            clip_count,
            at: self.clock.now_utc(),
        });
        Some(decision)
    }

    fn notify_gating(&self, counters: &SessionCounters) -> Option<Event> {
        let decision = lock(&self.gating).notify(counters, self.wallet.is_connected())?;
        Some(Event::GatingChanged {
            decision,
            clip_count: counters.clip_count,
            at: self.clock.now_utc(),
        })
    }

    /// Dismiss the soft prompt. Returns false when there is no dismissible
    /// prompt showing.
    pub fn dismiss_wallet_prompt(&self) -> Result<bool, StorageError> {
        if !self.gating_decision().can_dismiss() {
            return Ok(false);
        }
        let counters = self.store.set_wallet_prompted()?;
        let at = self.clock.now_utc();
        let mut events = vec![
            Event::WalletPromptDismissed { at },
            Event::CountersChanged { counters, at },
        ];
        events.extend(self.notify_gating(&counters));
        self.publish_all(events);
        Ok(true)
    }

    // ── Wallet ──

    pub fn connect_wallet(&self, address: &str) -> Result<(), AuthError> {
        self.wallet.connect(address)?;
        let event = self.notify_gating(&self.store.counters());
        self.publish_all(event);
        Ok(())
    }

    pub fn disconnect_wallet(&self) -> Result<(), AuthError> {
        self.wallet.disconnect()?;
        let event = self.notify_gating(&self.store.counters());
        self.publish_all(event);
        Ok(())
    }

    // ── Betting ──

    /// Run `f` against the bet engine and publish whatever it returns.
    pub fn with_bet(&self, f: impl FnOnce(&mut BetAccrualEngine) -> Option<Event>) -> Option<Event> {
        let event = f(&mut lock(&self.bet));
        if let Some(ref event) = event {
            self.publish(event);
        }
        event
    }

    pub fn bet_amount(&self) -> u64 {
        lock(&self.bet).bet_amount()
    }

    // ── Resets ──

    /// Post-submission reset: clears the submitted records, zeroes the batch
    /// counters and the bet. Points and level are kept. Records made while
    /// the batch was in flight stay pending.
    pub fn reset_after_submission(
        &self,
        batch: &PendingBatch,
    ) -> Result<SessionCounters, StorageError> {
        let counters = self.store.clear_submitted(batch)?;
        let reward = {
            let mut reward = lock(&self.reward);
            reward.classifications_count = reward
                .classifications_count
                .saturating_sub(batch.len() as u32);
            *reward
        };
        save_reward(&self.store, &reward)?;

        let at = self.clock.now_utc();
        let mut events = Vec::new();
        events.extend(lock(&self.bet).reset());
        events.push(Event::CountersChanged { counters, at });
        events.extend(self.notify_gating(&counters));
        self.publish_all(events);
        Ok(counters)
    }

    /// Start a new session id with zeroed counters.
    pub fn reset_session(&self) -> Result<String, StorageError> {
        let session_id = self.store.reset_session()?;
        let counters = self.store.counters();
        let at = self.clock.now_utc();
        let mut events = Vec::new();
        events.extend(lock(&self.bet).reset());
        events.push(Event::SessionReset {
            session_id: session_id.clone(),
            at,
        });
        events.push(Event::CountersChanged { counters, at });
        events.extend(self.notify_gating(&counters));
        self.publish_all(events);
        Ok(session_id)
    }

    pub fn status(&self) -> SessionStatus {
        let counters = self.store.counters();
        let pending = self.store.pending_count();
        let (decision, remaining) = {
            let gating = lock(&self.gating);
            let policy = gating.policy();
            (
                policy.evaluate(&counters, self.wallet.is_connected()),
                policy.remaining_until_required(&counters),
            )
        };
        SessionStatus {
            session_id: self.store.session_id(),
            counters,
            pending,
            reward: self.reward(),
            remaining_until_required: remaining,
            can_submit: pending >= u64::from(self.config.session.submit_min_batch),
            decision,
            bet_amount: self.bet_amount(),
            wallet_address: self.wallet.address(),
            last_submitted: self.store.last_submitted(),
        }
    }
}

fn load_reward(store: &SessionStore) -> RewardState {
    match store.kv_get(REWARD_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "discarding corrupt reward state");
            RewardState::default()
        }),
        Ok(None) => RewardState::default(),
        Err(e) => {
            warn!(error = %e, "failed to read reward state");
            RewardState::default()
        }
    }
}

fn save_reward(store: &SessionStore, reward: &RewardState) -> Result<(), StorageError> {
    let raw = serde_json::to_string(reward).map_err(|e| StorageError::Corrupt {
        key: REWARD_KEY.into(),
        message: e.to_string(),
    })?;
    store.kv_set(REWARD_KEY, &raw)
}
