mod monitor;
mod policy;

pub use monitor::GatingMonitor;
pub use policy::{evaluate, GatingDecision, GatingPolicy, PromptLevel};
