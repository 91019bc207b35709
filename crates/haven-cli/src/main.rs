use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "haven-cli", version, about = "HAVEN CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classification session
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Wallet connection
    Wallet {
        #[command(subcommand)]
        action: commands::wallet::WalletAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Clip and label sources
    Content {
        #[command(subcommand)]
        action: commands::content::ContentAction,
    },
    /// Prefetch clips and report what was fetched (cached files are removed on exit)
    Prefetch(commands::prefetch::PrefetchArgs),
    /// Betting
    Bet {
        #[command(subcommand)]
        action: commands::bet::BetAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("HAVEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Wallet { action } => commands::wallet::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Content { action } => commands::content::run(action),
        Commands::Prefetch(args) => commands::prefetch::run(args),
        Commands::Bet { action } => commands::bet::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
