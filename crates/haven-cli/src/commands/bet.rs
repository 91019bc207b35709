use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use haven_core::betting::{BetHistoryEntry, BetHistoryFilter, BetHistoryStats, StatusFilter, TimeRange};
use haven_core::{BetAccrualEngine, Event, FrameQueue, ManualClock};
use serde_json::json;

use super::{open_context, print_json, CliResult};

/// Display refresh interval used to drive simulated holds.
const FRAME_MS: u64 = 16;

#[derive(Subcommand)]
pub enum BetAction {
    /// Simulate holding the bet control
    Hold {
        /// Hold duration in milliseconds
        #[arg(long)]
        ms: u64,
        /// Point balance; defaults to the session's points
        #[arg(long)]
        points: Option<u64>,
    },
    /// Summarize a bet history JSON file
    Stats {
        /// JSON array of bet history entries
        file: PathBuf,
        /// all, won, lost or pending
        #[arg(long, default_value = "all", value_parser = parse_lowercase::<StatusFilter>)]
        status: StatusFilter,
        /// day, week, month or all
        #[arg(long, default_value = "all", value_parser = parse_lowercase::<TimeRange>)]
        range: TimeRange,
    },
}

fn parse_lowercase<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
        .map_err(|e| e.to_string())
}

pub fn run(action: BetAction) -> CliResult {
    match action {
        BetAction::Hold { ms, points } => {
            let ctx = open_context()?;
            let balance = points.unwrap_or_else(|| ctx.reward().points);
            let clock = Arc::new(ManualClock::new(0));
            let frames = FrameQueue::new();
            let mut engine = BetAccrualEngine::new(
                ctx.config().betting.clone(),
                clock.clone(),
                Box::new(frames.clone()),
            );
            engine.set_balance(balance);

            let mut ticks = 0u64;
            engine.start();
            while frames.take_due().is_some() && ticks * FRAME_MS < ms {
                clock.advance(FRAME_MS);
                ticks += 1;
                if let Some(Event::BetChanged { bet_amount, state, .. }) = engine.tick() {
                    tracing::debug!(bet_amount, ?state, ticks, "bet changed");
                }
            }
            let auto_stopped = !engine.is_accruing();
            engine.stop();

            print_json(&json!({
                "balance": balance,
                "betAmount": engine.bet_amount(),
                "state": engine.state(),
                "frames": ticks,
                "reachedBalance": auto_stopped,
            }))
        }
        BetAction::Stats {
            file,
            status,
            range,
        } => {
            let raw = std::fs::read_to_string(&file)?;
            let entries: Vec<BetHistoryEntry> = serde_json::from_str(&raw)?;
            let filter = BetHistoryFilter {
                status,
                time_range: range,
            };
            let matching = filter.apply(&entries, chrono::Utc::now());
            print_json(&json!({
                "filter": filter,
                "stats": BetHistoryStats::compute(matching.iter().copied()),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_values_parse_case_insensitively() {
        assert_eq!(parse_lowercase::<StatusFilter>("Won").unwrap(), StatusFilter::Won);
        assert_eq!(parse_lowercase::<TimeRange>("week").unwrap(), TimeRange::Week);
        assert!(parse_lowercase::<TimeRange>("year").is_err());
    }
}
