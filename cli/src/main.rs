//! Command-line client for the mangashelf storefront.
//!
//! Reader commands:
//! - balance: Show the wallet
//! - transactions: List ledger rows
//! - purchase: Buy a comic or chapter
//!
//! Admin commands:
//! - topup: Credit coins (or `--refund`) to a username or user ID
//! - ban / suspend / unban / bans: Manage sanctions
//! - analytics: Top comics and revenue
//!
//! Configuration via environment:
//! - MANGASHELF_URL: Base URL of the server (default: http://localhost:3000)
//! - MANGASHELF_TOKEN: JWT Bearer token for authentication

mod commands;

use clap::{Parser, Subcommand};

use commands::{
    analytics::AnalyticsArgs,
    balance::{BalanceArgs, TransactionsArgs},
    ban::{BanArgs, BansArgs, SuspendArgs, UnbanArgs},
    purchase::PurchaseArgs,
    topup::TopupArgs,
};

/// mangashelf CLI
///
/// JSON output by default for scripts; --human for formatted output.
#[derive(Parser)]
#[command(name = "mangashelf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    /// Server URL
    #[arg(
        long,
        env = "MANGASHELF_URL",
        default_value = "http://localhost:3000",
        global = true
    )]
    url: String,

    /// JWT Bearer token for authentication
    #[arg(long, env = "MANGASHELF_TOKEN", global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show your coin balance
    Balance(BalanceArgs),

    /// List your wallet transactions, newest first
    Transactions(TransactionsArgs),

    /// Buy a comic or a single chapter
    Purchase(PurchaseArgs),

    /// Credit coins to a user (admin)
    Topup(TopupArgs),

    /// Permanently ban a user (admin)
    Ban(BanArgs),

    /// Suspend a user for a number of days (admin)
    Suspend(SuspendArgs),

    /// Lift a ban or suspension (admin)
    Unban(UnbanArgs),

    /// List bans (admin)
    Bans(BansArgs),

    /// Show top comics and total revenue (admin)
    Analytics(AnalyticsArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let client = match commands::build_client(cli.token.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let url = cli.url.trim_end_matches('/');
    let result = match cli.command {
        Commands::Balance(args) => commands::balance::execute(&client, url, cli.human, args).await,
        Commands::Transactions(args) => {
            commands::balance::execute_transactions(&client, url, cli.human, args).await
        }
        Commands::Purchase(args) => commands::purchase::execute(&client, url, cli.human, args).await,
        Commands::Topup(args) => commands::topup::execute(&client, url, cli.human, args).await,
        Commands::Ban(args) => commands::ban::execute_ban(&client, url, cli.human, args).await,
        Commands::Suspend(args) => {
            commands::ban::execute_suspend(&client, url, cli.human, args).await
        }
        Commands::Unban(args) => commands::ban::execute_unban(&client, url, cli.human, args).await,
        Commands::Bans(args) => commands::ban::execute_list(&client, url, cli.human, args).await,
        Commands::Analytics(args) => {
            commands::analytics::execute(&client, url, cli.human, args).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
