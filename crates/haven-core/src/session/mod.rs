mod context;
mod store;
mod types;

pub use context::{ClassifyOutcome, Listener, SessionContext, SessionStatus, SubscriptionId};
pub use store::{PendingBatch, SessionStore};
pub use types::{level_for, ClassificationRecord, PromptLatch, RewardState, SessionCounters};
