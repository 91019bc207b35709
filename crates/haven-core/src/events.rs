use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::betting::AccrualState;
use crate::gating::GatingDecision;
use crate::session::SessionCounters;

/// Every state change in the session produces an Event.
/// Hosts subscribe through [`SessionContext::subscribe`](crate::SessionContext::subscribe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ClassificationRecorded {
        content_id: String,
        action_id: String,
        points_awarded: u64,
        at: DateTime<Utc>,
    },
    CountersChanged {
        counters: SessionCounters,
        at: DateTime<Utc>,
    },
    /// Gating decision differs from the last one emitted.
    GatingChanged {
        decision: GatingDecision,
        clip_count: u32,
        at: DateTime<Utc>,
    },
    /// Clip count crossed the betting threshold for the first time this batch.
    BettingUnlocked {
        clip_count: u32,
        at: DateTime<Utc>,
    },
    WalletPromptDismissed {
        at: DateTime<Utc>,
    },
    BetChanged {
        bet_amount: u64,
        state: AccrualState,
        at: DateTime<Utc>,
    },
    BatchSubmitted {
        count: usize,
        at: DateTime<Utc>,
    },
    SubmissionFailed {
        message: String,
        transient: bool,
        pending: usize,
        at: DateTime<Utc>,
    },
    SessionReset {
        session_id: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::ClassificationRecorded { at, .. }
            | Event::CountersChanged { at, .. }
            | Event::GatingChanged { at, .. }
            | Event::BettingUnlocked { at, .. }
            | Event::WalletPromptDismissed { at }
            | Event::BetChanged { at, .. }
            | Event::BatchSubmitted { at, .. }
            | Event::SubmissionFailed { at, .. }
            | Event::SessionReset { at, .. } => *at,
        }
    }
}
