pub mod bet;
pub mod config;
pub mod content;
pub mod prefetch;
pub mod session;
pub mod wallet;

use std::sync::Arc;
use std::time::Duration;

use haven_core::{Config, FrameQueue, SessionContext, SessionStore, StoredWallet, SystemClock};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the on-disk session with a persisted wallet.
pub fn open_context() -> Result<SessionContext, Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    // Each invocation continues the stored session; `session reset` starts a new one.
    config.session.reset_on_load = false;
    let store = Arc::new(SessionStore::open(&config)?);
    let wallet = Arc::new(StoredWallet::new(Arc::clone(&store)));
    Ok(SessionContext::new(
        store,
        config,
        wallet,
        Arc::new(SystemClock),
        Box::new(FrameQueue::new()),
    ))
}

pub fn http_client(timeout_secs: u64) -> Result<haven_core::HttpClient, Box<dyn std::error::Error>> {
    Ok(haven_core::http_client(Duration::from_secs(timeout_secs))?)
}

pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
