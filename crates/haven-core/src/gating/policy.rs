//! Wallet gating policy.
//!
//! Pure mapping from progression counters and connection status to what
//! the host must show:
//!
//! ```text
//! clip_count:   0 ........ 25 ........ 50 ........
//! disconnected: none      soft*       hard + block
//! connected:    none      none        none
//! ```
//!
//! `*` only until the soft prompt is dismissed (wallet latch set).

use serde::{Deserialize, Serialize};

use crate::session::SessionCounters;
use crate::storage::GatingConfig;

/// Prompt severity, for hosts that render a single modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptLevel {
    None,
    /// Dismissible suggestion to connect.
    Soft,
    /// Mandatory; cannot be dismissed.
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatingDecision {
    pub show_soft_prompt: bool,
    pub show_hard_prompt: bool,
    pub block_navigation: bool,
}

impl GatingDecision {
    pub fn prompt_level(&self) -> PromptLevel {
        if self.show_hard_prompt {
            PromptLevel::Hard
        } else if self.show_soft_prompt {
            PromptLevel::Soft
        } else {
            PromptLevel::None
        }
    }

    /// Only a showing soft prompt can be dismissed.
    pub fn can_dismiss(&self) -> bool {
        self.show_soft_prompt && !self.show_hard_prompt
    }
}

/// Thresholds the decision is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatingPolicy {
    pub soft_prompt_threshold: u32,
    pub hard_prompt_threshold: u32,
}

impl Default for GatingPolicy {
    fn default() -> Self {
        Self {
            soft_prompt_threshold: 25,
            hard_prompt_threshold: 50,
        }
    }
}

impl From<&GatingConfig> for GatingPolicy {
    fn from(config: &GatingConfig) -> Self {
        Self {
            soft_prompt_threshold: config.soft_prompt_threshold,
            hard_prompt_threshold: config.hard_prompt_threshold,
        }
    }
}

impl GatingPolicy {
    pub fn evaluate(&self, counters: &SessionCounters, is_connected: bool) -> GatingDecision {
        let count = counters.clip_count;
        GatingDecision {
            show_soft_prompt: !is_connected
                && count >= self.soft_prompt_threshold
                && count < self.hard_prompt_threshold
                && !counters.wallet_prompted(),
            show_hard_prompt: !is_connected && count >= self.hard_prompt_threshold,
            block_navigation: counters.wallet_required && !is_connected,
        }
    }

    /// Clips left before connecting becomes mandatory.
    pub fn remaining_until_required(&self, counters: &SessionCounters) -> u32 {
        self.hard_prompt_threshold.saturating_sub(counters.clip_count)
    }
}

/// Evaluate with the default 25/50 thresholds.
pub fn evaluate(counters: &SessionCounters, is_connected: bool) -> GatingDecision {
    GatingPolicy::default().evaluate(counters, is_connected)
}
