mod accrual;
mod history;

pub use accrual::{AccrualState, BetAccrualEngine, FrameId, FrameQueue, FrameScheduler};
pub use history::{
    BetHistoryEntry, BetHistoryFilter, BetHistoryStats, BetOutcome, StatusFilter, TimeRange,
};
