//! PURCHASE command - Buy a comic or a single chapter.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use colored::Colorize;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{format_timestamp, make_request, output, HumanReadable};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Item {
    Comic,
    Chapter,
}

#[derive(Args)]
pub struct PurchaseArgs {
    /// What to buy
    #[arg(value_enum)]
    pub item: Item,

    /// Comic or chapter ID
    pub id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PurchaseResponse {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub purchased_at: DateTime<Utc>,
    pub balance: i64,
    pub transaction: Option<serde_json::Value>,
}

impl HumanReadable for PurchaseResponse {
    fn print_human(&self) {
        println!("{}", "Purchase complete!".green().bold());
        println!();
        println!("  {} {}", "At:".cyan(), format_timestamp(&self.purchased_at));
        if let Some(amount) = self.transaction.as_ref().and_then(|tx| tx["amount"].as_i64()) {
            println!("  {} {}", "Paid:".cyan(), -amount);
        } else {
            println!("  {} {}", "Paid:".cyan(), "free".dimmed());
        }
        println!("  {} {}", "Balance:".cyan(), self.balance.to_string().bold());
    }
}

pub async fn execute(client: &Client, base_url: &str, human: bool, args: PurchaseArgs) -> Result<()> {
    let path = match args.item {
        Item::Comic => "comics",
        Item::Chapter => "chapters",
    };
    let url = format!("{base_url}/api/{path}/{}/purchase", args.id);
    let response: PurchaseResponse = make_request(client.post(&url)).await?;
    output(&response, human)
}
