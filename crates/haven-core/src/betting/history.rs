//! Bet history filtering and aggregate stats.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Won,
    Lost,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetHistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub clip_id: String,
    pub bet_amount: u64,
    pub outcome: BetOutcome,
    #[serde(default)]
    pub points_earned: Option<u64>,
    #[serde(default)]
    pub consensus_label: Option<String>,
    #[serde(default)]
    pub user_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Won,
    Lost,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    #[default]
    All,
}

impl TimeRange {
    fn window(self) -> Option<Duration> {
        match self {
            TimeRange::Day => Some(Duration::days(1)),
            TimeRange::Week => Some(Duration::weeks(1)),
            TimeRange::Month => Some(Duration::days(30)),
            TimeRange::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetHistoryFilter {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub time_range: TimeRange,
}

impl BetHistoryFilter {
    pub fn matches(&self, entry: &BetHistoryEntry, now: DateTime<Utc>) -> bool {
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Won => entry.outcome == BetOutcome::Won,
            StatusFilter::Lost => entry.outcome == BetOutcome::Lost,
            StatusFilter::Pending => entry.outcome == BetOutcome::Pending,
        };
        let time_ok = self
            .time_range
            .window()
            .map(|window| entry.timestamp >= now - window)
            .unwrap_or(true);
        status_ok && time_ok
    }

    pub fn apply<'a>(
        &self,
        entries: &'a [BetHistoryEntry],
        now: DateTime<Utc>,
    ) -> Vec<&'a BetHistoryEntry> {
        entries.iter().filter(|e| self.matches(e, now)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetHistoryStats {
    pub total_bets: usize,
    pub won_bets: usize,
    pub total_points_won: u64,
    pub total_points_lost: u64,
    /// Percentage, 0..=100.
    pub win_rate: f64,
}

impl BetHistoryStats {
    pub fn compute<'a>(entries: impl IntoIterator<Item = &'a BetHistoryEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total_bets += 1;
            match entry.outcome {
                BetOutcome::Won => {
                    stats.won_bets += 1;
                    stats.total_points_won += entry.points_earned.unwrap_or(0);
                }
                BetOutcome::Lost => stats.total_points_lost += entry.bet_amount,
                BetOutcome::Pending => {}
            }
        }
        if stats.total_bets > 0 {
            stats.win_rate = stats.won_bets as f64 / stats.total_bets as f64 * 100.0;
        }
        stats
    }
}
