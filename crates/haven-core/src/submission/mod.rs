//! Classification submission.
//!
//! [`SubmissionPipeline`] sends the whole pending batch to a
//! [`SubmissionEndpoint`] and clears local state only after the endpoint
//! accepted it.

mod endpoint;
mod pipeline;

pub use endpoint::{HttpSubmissionEndpoint, SubmissionBatch, SubmissionEndpoint};
pub use pipeline::{SubmissionPipeline, SubmissionReceipt};
