//! Bet accrual engine.
//!
//! A clock-driven state machine that grows the bet while the user holds the
//! bet control. Like a display refresh loop, the host calls `tick()` once per
//! frame it was granted by the injected [`FrameScheduler`]; the engine
//! requests the next frame only while it is still accruing.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start()--> Accruing --stop() | bet == balance--> Idle
//! ```
//!
//! Speed grows linearly with hold time (`base + acceleration * t`, in points
//! per second, capped at `max_speed`). Fractional points accumulate
//! internally; only whole points are ever applied to `bet_amount`.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::events::Event;
use crate::storage::BettingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccrualState {
    Idle,
    Accruing,
}

/// Opaque handle for one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

/// Frame-callback capability, in the spirit of `requestAnimationFrame`.
pub trait FrameScheduler: Send {
    fn request_frame(&mut self) -> FrameId;
    fn cancel_frame(&mut self, id: FrameId);
}

#[derive(Debug, Default)]
struct FrameQueueState {
    next_id: u64,
    pending: Option<FrameId>,
    requested: u64,
    cancelled: u64,
}

/// Single-slot frame queue. The host loop takes the pending frame and, if
/// there was one, calls `tick()` on the engine. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    state: Arc<Mutex<FrameQueueState>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrameQueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Consume the pending frame, if any.
    pub fn take_due(&self) -> Option<FrameId> {
        self.lock().pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    pub fn requested_count(&self) -> u64 {
        self.lock().requested
    }

    pub fn cancelled_count(&self) -> u64 {
        self.lock().cancelled
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameId {
        let mut state = self.lock();
        state.next_id += 1;
        state.requested += 1;
        let id = FrameId(state.next_id);
        state.pending = Some(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        let mut state = self.lock();
        if state.pending == Some(id) {
            state.pending = None;
        }
        state.cancelled += 1;
    }
}

pub struct BetAccrualEngine {
    config: BettingConfig,
    clock: Arc<dyn Clock>,
    scheduler: Box<dyn FrameScheduler>,
    state: AccrualState,
    bet_amount: u64,
    /// Upper bound: the user's current points.
    balance: u64,
    disabled: bool,
    /// Focus view; betting controls are inert while expanded.
    expanded: bool,
    started_at_ms: u64,
    last_tick_ms: u64,
    accumulated: f64,
    frame: Option<FrameId>,
}

impl BetAccrualEngine {
    pub fn new(
        config: BettingConfig,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Self {
        Self {
            config,
            clock,
            scheduler,
            state: AccrualState::Idle,
            bet_amount: 0,
            balance: 0,
            disabled: false,
            expanded: false,
            started_at_ms: 0,
            last_tick_ms: 0,
            accumulated: 0.0,
            frame: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> AccrualState {
        self.state
    }

    pub fn bet_amount(&self) -> u64 {
        self.bet_amount
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn is_accruing(&self) -> bool {
        self.state == AccrualState::Accruing
    }

    /// Points per second after `elapsed_ms` of holding.
    pub fn speed(&self, elapsed_ms: u64) -> f64 {
        let speed = self.config.base_speed + self.config.acceleration * elapsed_ms as f64 / 1000.0;
        speed.min(self.config.max_speed)
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Update the upper bound. A shrinking balance pulls the bet down with it.
    pub fn set_balance(&mut self, points: u64) -> Option<Event> {
        self.balance = points;
        if self.bet_amount > points {
            self.bet_amount = points;
            if self.is_accruing() {
                self.halt();
            }
            return Some(self.changed());
        }
        None
    }

    pub fn set_disabled(&mut self, disabled: bool) -> Option<Event> {
        self.disabled = disabled;
        if disabled && self.is_accruing() {
            return self.stop();
        }
        None
    }

    pub fn set_expanded(&mut self, expanded: bool) -> Option<Event> {
        self.expanded = expanded;
        if expanded && self.is_accruing() {
            return self.stop();
        }
        None
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a hold. No-op if already accruing, disabled or expanded.
    pub fn start(&mut self) -> Option<Event> {
        if self.is_accruing() || self.disabled || self.expanded {
            return None;
        }
        let now = self.clock.now_ms();
        self.state = AccrualState::Accruing;
        self.started_at_ms = now;
        self.last_tick_ms = now;
        self.accumulated = 0.0;
        self.frame = Some(self.scheduler.request_frame());
        debug!(bet_amount = self.bet_amount, balance = self.balance, "bet accrual started");
        Some(self.changed())
    }

    /// One frame. Returns an event when the state or the bet changed.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.is_accruing() {
            return None;
        }
        // The frame we were granted has fired.
        self.frame = None;

        let now = self.clock.now_ms();
        let elapsed = now.saturating_sub(self.started_at_ms);
        let dt = now.saturating_sub(self.last_tick_ms);
        self.last_tick_ms = now;
        self.accumulated += self.speed(elapsed) * dt as f64 / 1000.0;

        let mut changed = false;
        if self.bet_amount < self.balance && self.accumulated >= 1.0 {
            let whole = self.accumulated.floor();
            self.accumulated -= whole;
            self.bet_amount = (self.bet_amount + whole as u64).min(self.balance);
            changed = true;
        }

        if self.bet_amount >= self.balance {
            self.state = AccrualState::Idle;
            debug!(bet_amount = self.bet_amount, "bet accrual reached balance");
            return Some(self.changed());
        }

        self.frame = Some(self.scheduler.request_frame());
        changed.then(|| self.changed())
    }

    /// End a hold. Cancels the outstanding frame exactly once.
    pub fn stop(&mut self) -> Option<Event> {
        if !self.is_accruing() {
            return None;
        }
        self.halt();
        debug!(bet_amount = self.bet_amount, "bet accrual stopped");
        Some(self.changed())
    }

    pub fn increment(&mut self) -> Option<Event> {
        if self.disabled || self.expanded || self.bet_amount >= self.balance {
            return None;
        }
        self.bet_amount += 1;
        Some(self.changed())
    }

    pub fn decrement(&mut self) -> Option<Event> {
        if self.disabled || self.expanded || self.bet_amount == 0 {
            return None;
        }
        self.bet_amount -= 1;
        Some(self.changed())
    }

    /// Back to zero and Idle; called after every swipe and submission.
    pub fn reset(&mut self) -> Option<Event> {
        let was = (self.bet_amount, self.state);
        self.halt();
        self.bet_amount = 0;
        self.accumulated = 0.0;
        (was != (0, AccrualState::Idle)).then(|| self.changed())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn halt(&mut self) {
        self.state = AccrualState::Idle;
        if let Some(id) = self.frame.take() {
            self.scheduler.cancel_frame(id);
        }
    }

    fn changed(&self) -> Event {
        Event::BetChanged {
            bet_amount: self.bet_amount,
            state: self.state,
            at: self.clock.now_utc(),
        }
    }
}
