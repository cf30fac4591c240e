//! BAN, SUSPEND, UNBAN and BANS commands - Admin sanctions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{format_timestamp, make_request, output, HumanReadable};

#[derive(Args)]
pub struct BanArgs {
    /// Username or user ID
    pub identifier: String,

    #[arg(long, short = 'r')]
    pub reason: String,
}

#[derive(Args)]
pub struct SuspendArgs {
    /// Username or user ID
    pub identifier: String,

    #[arg(long, short = 'r')]
    pub reason: String,

    /// Length of the suspension in days
    #[arg(long)]
    pub days: i64,
}

#[derive(Args)]
pub struct UnbanArgs {
    /// Ban record ID
    pub ban_id: Uuid,
}

#[derive(Args)]
pub struct BansArgs {
    /// Include lifted bans
    #[arg(long)]
    pub all: bool,
}

#[derive(Serialize)]
struct SanctionRequest {
    identifier: String,
    reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    days: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BanRecord {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub reason: String,
    pub banned_by: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub banned_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl BanRecord {
    fn print_row(&self) {
        let state = if self.is_active {
            "active".red()
        } else {
            "lifted".dimmed()
        };
        println!("  {} {} [{}]", self.kind.bold(), self.user_id, state);
        println!("    {} {}", "ID:".cyan(), self.id);
        println!("    {} {}", "Reason:".cyan(), self.reason);
        println!(
            "    {} {} by {}",
            "Since:".cyan(),
            format_timestamp(&self.banned_at),
            self.banned_by
        );
        if let Some(expires_at) = &self.expires_at {
            println!("    {} {}", "Until:".cyan(), format_timestamp(expires_at));
        }
    }
}

impl HumanReadable for BanRecord {
    fn print_human(&self) {
        self.print_row();
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BanList(pub Vec<BanRecord>);

impl HumanReadable for BanList {
    fn print_human(&self) {
        println!("{}", "Bans".green().bold());
        println!("{}", "=".repeat(70));
        if self.0.is_empty() {
            println!("  {}", "(No bans)".dimmed());
            return;
        }
        for record in &self.0 {
            record.print_row();
            println!();
        }
    }
}

pub async fn execute_ban(client: &Client, base_url: &str, human: bool, args: BanArgs) -> Result<()> {
    let url = format!("{base_url}/api/admin/bans");
    let body = SanctionRequest {
        identifier: args.identifier,
        reason: args.reason,
        days: None,
    };
    let response: BanRecord = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}

pub async fn execute_suspend(
    client: &Client,
    base_url: &str,
    human: bool,
    args: SuspendArgs,
) -> Result<()> {
    let url = format!("{base_url}/api/admin/suspensions");
    let body = SanctionRequest {
        identifier: args.identifier,
        reason: args.reason,
        days: Some(args.days),
    };
    let response: BanRecord = make_request(client.post(&url).json(&body)).await?;
    output(&response, human)
}

pub async fn execute_unban(client: &Client, base_url: &str, human: bool, args: UnbanArgs) -> Result<()> {
    let url = format!("{base_url}/api/admin/bans/{}", args.ban_id);
    let response: BanRecord = make_request(client.delete(&url)).await?;
    output(&response, human)
}

pub async fn execute_list(client: &Client, base_url: &str, human: bool, args: BansArgs) -> Result<()> {
    let url = format!("{base_url}/api/admin/bans");
    let request = client.get(&url).query(&[("include_inactive", args.all)]);
    let response: BanList = make_request(request).await?;
    output(&response, human)
}
