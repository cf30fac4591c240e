//! BALANCE and TRANSACTIONS commands - The caller's wallet.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{format_amount, format_timestamp, make_request, output, HumanReadable};

#[derive(Args)]
pub struct BalanceArgs {}

#[derive(Args)]
pub struct TransactionsArgs {
    /// Maximum number of rows (server default: 50)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub username: Option<String>,
    pub coins: i64,
}

impl HumanReadable for BalanceResponse {
    fn print_human(&self) {
        println!("{}", "Wallet".green().bold());
        println!();
        println!("  {} {}", "User:".cyan(), self.user_id);
        match &self.username {
            Some(username) => println!("  {} {}", "Username:".cyan(), username),
            None => println!("  {} {}", "Username:".cyan(), "(no wallet yet)".dimmed()),
        }
        println!("  {} {}", "Coins:".cyan(), self.coins.to_string().bold());
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransactionRow {
    pub id: String,
    pub kind: String,
    pub amount: i64,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransactionList(pub Vec<TransactionRow>);

impl HumanReadable for TransactionList {
    fn print_human(&self) {
        println!("{}", "Transactions".green().bold());
        println!("{}", "=".repeat(70));

        if self.0.is_empty() {
            println!("  {}", "(No transactions)".dimmed());
            return;
        }

        for tx in &self.0 {
            let amount = format_amount(tx.amount);
            let amount = if tx.amount >= 0 {
                amount.green()
            } else {
                amount.red()
            };
            println!(
                "  {}  {:>8}  {:<8}  {}",
                format_timestamp(&tx.created_at).dimmed(),
                amount,
                tx.kind,
                tx.description
            );
        }
    }
}

pub async fn execute(client: &Client, base_url: &str, human: bool, _args: BalanceArgs) -> Result<()> {
    let url = format!("{base_url}/api/wallet");
    let response: BalanceResponse = make_request(client.get(&url)).await?;
    output(&response, human)
}

pub async fn execute_transactions(
    client: &Client,
    base_url: &str,
    human: bool,
    args: TransactionsArgs,
) -> Result<()> {
    let url = format!("{base_url}/api/wallet/transactions");
    let mut request = client.get(&url);
    if let Some(limit) = args.limit {
        request = request.query(&[("limit", limit)]);
    }
    let response: TransactionList = make_request(request).await?;
    output(&response, human)
}
