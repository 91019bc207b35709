//! # HAVEN Core Library
//!
//! Client-side core of the HAVEN content-labeling app. Users swipe through
//! short clips and classify each one; progress gates a wallet connection,
//! unlocks betting and is submitted in batches. The CLI and any GUI host are
//! thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Session**: SQLite-backed store of pending classifications and
//!   progression counters, wrapped by a [`SessionContext`] that owns reward,
//!   bet and gating state and notifies subscribers
//! - **Gating**: pure policy plus an emit-on-change monitor
//! - **Betting**: a caller-driven accrual state machine and bet history stats
//! - **Submission**: all-or-nothing batch delivery
//! - **Prefetch**: bounded cache of locally materialized media
//!
//! ## Key Components
//!
//! - [`SessionStore`]: durable classifications and counters
//! - [`GatingPolicy`]: wallet prompt and navigation block rules
//! - [`BetAccrualEngine`]: hold-to-bet state machine
//! - [`SubmissionPipeline`]: batch submission
//! - [`PrefetchCache`]: media prefetch with LRU eviction
//! - [`Config`]: TOML configuration

pub mod auth;
pub mod betting;
pub mod clock;
pub mod content;
pub mod error;
pub mod events;
pub mod gating;
pub mod prefetch;
pub mod session;
pub mod storage;
pub mod submission;

pub use auth::{MemoryWallet, StoredWallet, WalletConnection};
pub use betting::{AccrualState, BetAccrualEngine, FrameQueue, FrameScheduler};
pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{Content, ContentSource, LabelOption, LabelSource, MediaKind, SwipeDirection};
pub use error::{
    AuthError, ConfigError, ContentError, CoreError, PrefetchError, StorageError, SubmissionError,
};
pub use events::Event;
pub use gating::{GatingDecision, GatingMonitor, GatingPolicy, PromptLevel};
pub use prefetch::{BlobHandle, BlobStore, PrefetchCache, PreloadProgress, PreloadStatus};
pub use session::{
    ClassificationRecord, ClassifyOutcome, RewardState, SessionContext, SessionCounters,
    SessionStatus, SessionStore,
};
pub use storage::{Config, Database};
pub use submission::{SubmissionEndpoint, SubmissionPipeline, SubmissionReceipt};

pub use reqwest::Client as HttpClient;

/// Shared HTTP client with the given request timeout.
pub fn http_client(timeout: std::time::Duration) -> Result<HttpClient, ContentError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("haven-core/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
