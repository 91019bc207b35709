use serde::{Deserialize, Serialize};

/// One swipe/tap decision. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    pub content_id: String,
    pub selected_action_id: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
}

/// One-shot prompt latch.
///
/// `Reset` behaves like `NotPrompted` for gating purposes but remembers
/// that the latch was cleared by a submission or session reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptLatch {
    #[default]
    NotPrompted,
    Prompted,
    Reset,
}

impl PromptLatch {
    pub fn is_prompted(self) -> bool {
        self == PromptLatch::Prompted
    }

    pub fn latch(&mut self) {
        *self = PromptLatch::Prompted;
    }

    pub fn reset(&mut self) {
        if *self == PromptLatch::Prompted {
            *self = PromptLatch::Reset;
        }
    }
}

/// Progression counters. Persisted as a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    pub clip_count: u32,
    #[serde(default)]
    pub wallet_prompt: PromptLatch,
    #[serde(default)]
    pub betting_prompt: PromptLatch,
    /// Latched once `clip_count` reaches the hard threshold.
    #[serde(default)]
    pub wallet_required: bool,
}

impl SessionCounters {
    pub fn wallet_prompted(&self) -> bool {
        self.wallet_prompt.is_prompted()
    }

    pub fn betting_prompted(&self) -> bool {
        self.betting_prompt.is_prompted()
    }

    /// Count one classification. Returns true if this crossed `required_at`.
    pub(crate) fn register_classification(&mut self, required_at: u32) -> bool {
        self.clip_count = self.clip_count.saturating_add(1);
        if !self.wallet_required && self.clip_count >= required_at {
            self.wallet_required = true;
            return true;
        }
        false
    }

    /// Zero progression after a successful submission.
    pub(crate) fn reset_progress(&mut self, clear_wallet_required: bool) {
        self.clip_count = 0;
        self.wallet_prompt.reset();
        self.betting_prompt.reset();
        if clear_wallet_required {
            self.wallet_required = false;
        }
    }
}

/// Points and level shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardState {
    pub points: u64,
    pub level: u64,
    pub classifications_count: u32,
}

impl Default for RewardState {
    fn default() -> Self {
        Self {
            points: 0,
            level: 1,
            classifications_count: 0,
        }
    }
}

impl RewardState {
    pub fn with_points(points: u64) -> Self {
        Self {
            points,
            level: level_for(points),
            classifications_count: 0,
        }
    }

    pub(crate) fn award(&mut self, points_value: u64) {
        self.points = self.points.saturating_add(points_value);
        self.level = level_for(self.points);
        self.classifications_count = self.classifications_count.saturating_add(1);
    }
}

pub fn level_for(points: u64) -> u64 {
    points / 100 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_transitions() {
        let mut latch = PromptLatch::default();
        latch.reset();
        assert_eq!(latch, PromptLatch::NotPrompted);
        latch.latch();
        assert!(latch.is_prompted());
        latch.reset();
        assert_eq!(latch, PromptLatch::Reset);
        assert!(!latch.is_prompted());
        latch.latch();
        assert!(latch.is_prompted());
    }

    #[test]
    fn wallet_required_latches_at_threshold() {
        let mut counters = SessionCounters {
            clip_count: 48,
            ..Default::default()
        };
        assert!(!counters.register_classification(50));
        assert!(counters.register_classification(50));
        assert!(counters.wallet_required);
        // Only the crossing reports true.
        assert!(!counters.register_classification(50));
        assert_eq!(counters.clip_count, 51);
    }

    #[test]
    fn reset_progress_respects_policy() {
        let mut counters = SessionCounters {
            clip_count: 60,
            wallet_prompt: PromptLatch::Prompted,
            betting_prompt: PromptLatch::Prompted,
            wallet_required: true,
        };
        let mut cleared = counters;
        counters.reset_progress(false);
        assert_eq!(counters.clip_count, 0);
        assert!(!counters.wallet_prompted());
        assert!(!counters.betting_prompted());
        assert!(counters.wallet_required);

        cleared.reset_progress(true);
        assert!(!cleared.wallet_required);
    }

    #[test]
    fn reward_level_follows_points() {
        let mut reward = RewardState::default();
        assert_eq!(reward.level, 1);
        reward.award(99);
        assert_eq!(reward.level, 1);
        reward.award(1);
        assert_eq!(reward.level, 2);
        assert_eq!(reward.classifications_count, 2);
        assert_eq!(RewardState::with_points(250).level, 3);
    }

    #[test]
    fn counters_serialize_camel_case() {
        let json = serde_json::to_value(SessionCounters::default()).unwrap();
        assert_eq!(json["clipCount"], 0);
        assert_eq!(json["walletPrompt"], "not_prompted");
        assert_eq!(json["walletRequired"], false);
    }
}
