//! Integration tests for wallet gating through the session context.

use std::sync::{Arc, Mutex};

use haven_core::gating::evaluate;
use haven_core::{
    Config, Content, Event, FrameQueue, GatingDecision, ManualClock, MediaKind, MemoryWallet,
    PromptLevel, SessionContext, SessionCounters, SessionStore, SwipeDirection, WalletConnection,
};

const ADDRESS: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

fn counters(clip_count: u32, wallet_prompted: bool) -> SessionCounters {
    let mut counters = SessionCounters {
        clip_count,
        wallet_required: clip_count >= 50,
        ..Default::default()
    };
    if wallet_prompted {
        counters.wallet_prompt.latch();
    }
    counters
}

#[test]
fn threshold_table() {
    assert!(!evaluate(&counters(24, false), false).show_soft_prompt);
    assert!(evaluate(&counters(25, false), false).show_soft_prompt);
    assert!(!evaluate(&counters(25, true), false).show_soft_prompt);
    assert!(!evaluate(&counters(25, false), true).show_soft_prompt);

    let hard = evaluate(&counters(50, false), false);
    assert!(hard.show_hard_prompt);
    assert!(hard.block_navigation);
    assert!(!hard.show_soft_prompt);
    assert_eq!(hard.prompt_level(), PromptLevel::Hard);

    assert!(!evaluate(&counters(50, false), true).block_navigation);
    assert_eq!(evaluate(&counters(80, true), true), GatingDecision::default());
}

struct Harness {
    ctx: SessionContext,
    clock: Arc<ManualClock>,
    wallet: Arc<MemoryWallet>,
    store: Arc<SessionStore>,
    events: Arc<Mutex<Vec<Event>>>,
}

fn harness() -> Harness {
    let config = Config::default();
    let clock = Arc::new(ManualClock::new(0));
    let store = Arc::new(SessionStore::in_memory(&config).unwrap());
    let wallet = Arc::new(MemoryWallet::new());
    let ctx = SessionContext::new(
        Arc::clone(&store),
        config,
        wallet.clone(),
        clock.clone(),
        Box::new(FrameQueue::new()),
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    ctx.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
    Harness {
        ctx,
        clock,
        wallet,
        store,
        events,
    }
}

fn swipe(ctx: &SessionContext, n: u32) {
    for i in 0..n {
        let content = Content {
            id: format!("clip-{i}"),
            url: format!("https://gw.example/ipfs/clip-{i}"),
            kind: MediaKind::Video,
            points_value: 1,
            left_action_id: Some("left".into()),
            right_action_id: Some("right".into()),
        };
        ctx.classify(&content, SwipeDirection::Right).unwrap();
    }
}

fn gating_changes(events: &Mutex<Vec<Event>>) -> Vec<GatingDecision> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::GatingChanged { decision, .. } => Some(*decision),
            _ => None,
        })
        .collect()
}

#[test]
fn soft_then_hard_progression_emits_each_change_once() {
    let h = harness();
    swipe(&h.ctx, 24);
    assert!(gating_changes(&h.events).is_empty());

    swipe(&h.ctx, 1);
    assert_eq!(gating_changes(&h.events).len(), 1);

    swipe(&h.ctx, 10);
    assert_eq!(gating_changes(&h.events).len(), 1);

    h.ctx.dismiss_wallet_prompt().unwrap();
    swipe(&h.ctx, 15);
    let changes = gating_changes(&h.events);
    assert_eq!(changes.len(), 3);
    assert!(!changes[1].show_soft_prompt);
    assert!(changes[2].block_navigation);
}

#[test]
fn poll_reconciles_writes_made_elsewhere() {
    let h = harness();
    // Another component writes to the same store directly.
    for i in 0..50 {
        h.store.record_classification(&format!("ext-{i}"), "a").unwrap();
    }
    let decision = h.ctx.poll_gating().unwrap();
    assert!(decision.block_navigation);

    // Throttled, then unchanged.
    assert!(h.ctx.poll_gating().is_none());
    h.clock.advance(1_000);
    assert!(h.ctx.poll_gating().is_none());

    // Wallet connected by another component.
    h.wallet.connect(ADDRESS).unwrap();
    assert!(h.ctx.poll_gating().is_none());
    h.clock.advance(1_000);
    assert_eq!(h.ctx.poll_gating(), Some(GatingDecision::default()));
}

#[test]
fn hard_prompt_cannot_be_dismissed() {
    let h = harness();
    swipe(&h.ctx, 50);
    assert!(!h.ctx.dismiss_wallet_prompt().unwrap());
    assert!(h.ctx.gating_decision().show_hard_prompt);

    h.ctx.connect_wallet(ADDRESS).unwrap();
    assert!(h.wallet.is_connected());
    assert!(!h.ctx.gating_decision().block_navigation);
    assert_eq!(h.ctx.status().remaining_until_required, 0);
}
