//! Emit-on-change wrapper around [`GatingPolicy`].
//!
//! Two entry points share one "last emitted" slot:
//! - `notify` runs on push, right after the local store changed;
//! - `poll` runs on a timer to pick up writes made elsewhere (another
//!   process on the same database) and is throttled to one evaluation per
//!   interval.
//!
//! Either returns `Some` only when the decision differs from the last one
//! handed out.

use tracing::debug;

use super::policy::{GatingDecision, GatingPolicy};
use crate::session::SessionCounters;

#[derive(Debug, Clone)]
pub struct GatingMonitor {
    policy: GatingPolicy,
    interval_ms: u64,
    last_check_ms: Option<u64>,
    last_emitted: GatingDecision,
}

impl GatingMonitor {
    pub fn new(policy: GatingPolicy, interval_ms: u64) -> Self {
        Self {
            policy,
            interval_ms,
            last_check_ms: None,
            last_emitted: GatingDecision::default(),
        }
    }

    pub fn policy(&self) -> &GatingPolicy {
        &self.policy
    }

    pub fn last_emitted(&self) -> GatingDecision {
        self.last_emitted
    }

    /// Periodic reconciliation. `counters` is only read when the throttle
    /// window has elapsed.
    pub fn poll(
        &mut self,
        now_ms: u64,
        counters: impl FnOnce() -> SessionCounters,
        is_connected: bool,
    ) -> Option<GatingDecision> {
        if let Some(last) = self.last_check_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return None;
            }
        }
        self.last_check_ms = Some(now_ms);
        let decision = self.policy.evaluate(&counters(), is_connected);
        self.emit_if_changed(decision)
    }

    /// Push-side evaluation; bypasses the throttle.
    pub fn notify(
        &mut self,
        counters: &SessionCounters,
        is_connected: bool,
    ) -> Option<GatingDecision> {
        let decision = self.policy.evaluate(counters, is_connected);
        self.emit_if_changed(decision)
    }

    fn emit_if_changed(&mut self, decision: GatingDecision) -> Option<GatingDecision> {
        if decision == self.last_emitted {
            return None;
        }
        debug!(?decision, previous = ?self.last_emitted, "gating decision changed");
        self.last_emitted = decision;
        Some(decision)
    }
}

impl Default for GatingMonitor {
    fn default() -> Self {
        Self::new(GatingPolicy::default(), 1_000)
    }
}
