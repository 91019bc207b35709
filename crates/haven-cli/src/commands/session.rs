use std::sync::Arc;

use clap::Subcommand;
use haven_core::submission::HttpSubmissionEndpoint;
use haven_core::{Content, MediaKind, SubmissionPipeline, SwipeDirection};
use serde_json::json;

use super::{http_client, open_context, print_json, runtime, CliResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Classify one clip
    Classify {
        /// Clip id (IPFS CID)
        content_id: String,
        /// Swipe direction: left or right
        #[arg(value_parser = parse_direction)]
        direction: SwipeDirection,
        /// Action bound to a left swipe
        #[arg(long)]
        left_action: Option<String>,
        /// Action bound to a right swipe
        #[arg(long)]
        right_action: Option<String>,
        /// Explicit label from the picker; overrides the direction
        #[arg(long)]
        action: Option<String>,
        /// Points awarded for this clip
        #[arg(long, default_value = "0")]
        points: u64,
    },
    /// Print session state as JSON
    Status,
    /// List pending classifications
    Pending,
    /// Dismiss the soft wallet prompt
    DismissPrompt,
    /// Start a new session
    Reset,
    /// Submit the pending batch
    Submit,
}

fn parse_direction(s: &str) -> Result<SwipeDirection, String> {
    s.parse()
}

pub fn run(action: SessionAction) -> CliResult {
    let ctx = open_context()?;
    match action {
        SessionAction::Classify {
            content_id,
            direction,
            left_action,
            right_action,
            action,
            points,
        } => {
            let url = format!(
                "{}/{}",
                ctx.config().api.ipfs_gateway.trim_end_matches('/'),
                content_id
            );
            let content = Content {
                id: content_id,
                url,
                kind: MediaKind::Video,
                points_value: points,
                left_action_id: left_action.or_else(|| Some("left".into())),
                right_action_id: right_action.or_else(|| Some("right".into())),
            };
            let outcome = match action {
                Some(action_id) => ctx.classify_as(&content, &action_id)?,
                None => ctx.classify(&content, direction)?,
            };
            print_json(&outcome)
        }
        SessionAction::Status => print_json(&ctx.status()),
        SessionAction::Pending => print_json(&ctx.store().try_classifications()?),
        SessionAction::DismissPrompt => {
            let dismissed = ctx.dismiss_wallet_prompt()?;
            print_json(&json!({ "dismissed": dismissed }))
        }
        SessionAction::Reset => {
            let session_id = ctx.reset_session()?;
            print_json(&json!({ "sessionId": session_id }))
        }
        SessionAction::Submit => {
            let client = http_client(ctx.config().api.submit_timeout_secs)?;
            let endpoint = HttpSubmissionEndpoint::new(client, &ctx.config().api);
            let pipeline = SubmissionPipeline::new(Arc::new(endpoint), ctx.config());
            let receipt = runtime()?.block_on(pipeline.submit(&ctx))?;
            print_json(&receipt)
        }
    }
}
