//! TOPUP command - Admin credit to a user's wallet.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{make_request, output, HumanReadable};

#[derive(Args)]
pub struct TopupArgs {
    /// Username or user ID
    pub identifier: String,

    /// Coins to credit
    pub amount: i64,

    /// Note stored on the transaction
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Record the credit as a refund instead of a top-up
    #[arg(long)]
    pub refund: bool,
}

#[derive(Serialize)]
struct CreditRequest {
    identifier: String,
    amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WalletResponse {
    pub user_id: String,
    pub username: String,
    pub coins: i64,
}

impl HumanReadable for WalletResponse {
    fn print_human(&self) {
        println!("{}", "Wallet credited!".green().bold());
        println!();
        println!("  {} {} ({})", "User:".cyan(), self.username, self.user_id);
        println!("  {} {}", "Balance:".cyan(), self.coins.to_string().bold());
    }
}

pub async fn execute(client: &Client, base_url: &str, human: bool, args: TopupArgs) -> Result<()> {
    let endpoint = if args.refund { "refund" } else { "topup" };
    let url = format!("{base_url}/api/admin/{endpoint}");
    let body = CreditRequest {
        identifier: args.identifier,
        amount: args.amount,
        description: args.description,
    };
    let response: WalletResponse = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}
