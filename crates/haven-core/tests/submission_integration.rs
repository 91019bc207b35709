//! End-to-end submission against a mock HTTP endpoint.

use std::sync::Arc;

use haven_core::submission::HttpSubmissionEndpoint;
use haven_core::{
    Config, Content, FrameQueue, MediaKind, MemoryWallet, SessionContext, SessionStore,
    SubmissionError, SubmissionPipeline, SwipeDirection, SystemClock,
};
use mockito::Matcher;

const ADDRESS: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

fn context(base_url: String) -> SessionContext {
    let mut config = Config::default();
    config.api.base_url = base_url;
    let store = Arc::new(SessionStore::in_memory(&config).unwrap());
    SessionContext::new(
        store,
        config,
        Arc::new(MemoryWallet::new()),
        Arc::new(SystemClock),
        Box::new(FrameQueue::new()),
    )
}

fn label_three(ctx: &SessionContext) {
    for id in ["a", "b", "c"] {
        let content = Content {
            id: id.into(),
            url: format!("https://gw.example/ipfs/{id}"),
            kind: MediaKind::Video,
            points_value: 5,
            left_action_id: Some("sit".into()),
            right_action_id: Some("stand".into()),
        };
        ctx.classify(&content, SwipeDirection::Left).unwrap();
    }
}

fn pipeline(ctx: &SessionContext) -> SubmissionPipeline {
    let endpoint = HttpSubmissionEndpoint::new(reqwest::Client::new(), &ctx.config().api);
    SubmissionPipeline::new(Arc::new(endpoint), ctx.config())
}

#[tokio::test]
async fn failed_submission_keeps_all_three_records() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/classification/submit")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let ctx = context(format!("{}/api", server.url()));
    ctx.connect_wallet(ADDRESS).unwrap();
    label_three(&ctx);
    let before = ctx.store().classifications();

    let err = pipeline(&ctx).submit(&ctx).await.unwrap_err();
    mock.assert_async().await;
    assert!(matches!(err, SubmissionError::Rejected { status: 503, .. }));
    assert!(err.is_transient());

    assert_eq!(ctx.store().classifications(), before);
    assert_eq!(ctx.store().clip_count(), 3);
    assert_eq!(ctx.reward().classifications_count, 3);
}

#[tokio::test]
async fn successful_submission_clears_everything() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/classification/submit")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJsonString(format!(r#"{{"walletAddress":"{ADDRESS}"}}"#)),
            Matcher::Regex(r#""contentId":"a".*"contentId":"b".*"contentId":"c""#.into()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let ctx = context(format!("{}/api", server.url()));
    ctx.connect_wallet(ADDRESS).unwrap();
    label_three(&ctx);

    let receipt = pipeline(&ctx).submit(&ctx).await.unwrap();
    mock.assert_async().await;
    assert_eq!(receipt.count, 3);
    assert!(ctx.store().classifications().is_empty());
    assert_eq!(ctx.store().clip_count(), 0);
    assert_eq!(ctx.reward().classifications_count, 0);
    assert_eq!(ctx.reward().points, 15);
    assert!(!ctx.wallet().is_connected());
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    // Nothing listens on the discard port.
    let ctx = context("http://127.0.0.1:9/api".into());
    ctx.connect_wallet(ADDRESS).unwrap();
    label_three(&ctx);

    let err = pipeline(&ctx).submit(&ctx).await.unwrap_err();
    assert!(matches!(err, SubmissionError::Network(_)));
    assert!(err.is_transient());
    assert_eq!(ctx.store().classifications().len(), 3);
}
