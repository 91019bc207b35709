use clap::Subcommand;
use serde_json::json;

use super::{open_context, print_json, CliResult};

#[derive(Subcommand)]
pub enum WalletAction {
    /// Record a wallet connection
    Connect {
        /// Base58 public key
        address: String,
    },
    /// Drop the wallet connection
    Disconnect,
    /// Print connection state as JSON
    Status,
}

pub fn run(action: WalletAction) -> CliResult {
    let ctx = open_context()?;
    match action {
        WalletAction::Connect { address } => ctx.connect_wallet(&address)?,
        WalletAction::Disconnect => ctx.disconnect_wallet()?,
        WalletAction::Status => {}
    }
    let address = ctx.wallet().address();
    print_json(&json!({
        "connected": address.is_some(),
        "address": address,
        "gating": ctx.gating_decision(),
    }))
}
