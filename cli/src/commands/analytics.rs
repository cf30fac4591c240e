//! ANALYTICS command - Top comics and total revenue (admin).

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{make_request, output, HumanReadable};

#[derive(Args)]
pub struct AnalyticsArgs {
    /// Number of comics to show (server default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ComicStats {
    pub comic_id: Uuid,
    pub views: i64,
    pub purchases: i64,
    pub favorites: i64,
    pub average_rating: f64,
    pub revenue: i64,
}

#[derive(Debug, Deserialize)]
struct RevenueResponse {
    total_revenue: i64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub total_revenue: i64,
    pub top_comics: Vec<ComicStats>,
}

impl HumanReadable for AnalyticsReport {
    fn print_human(&self) {
        println!("{}", "Storefront Analytics".green().bold());
        println!("{}", "=".repeat(70));
        println!();
        println!(
            "  {} {} coins",
            "Total Revenue:".cyan(),
            self.total_revenue.to_string().bold()
        );
        println!();

        if self.top_comics.is_empty() {
            println!("  {}", "(No purchases yet)".dimmed());
            return;
        }

        println!(
            "  {:<36}  {:>9}  {:>7}  {:>6}  {:>5}  {:>7}",
            "Comic", "Purchases", "Revenue", "Views", "Favs", "Rating"
        );
        for stats in &self.top_comics {
            println!(
                "  {:<36}  {:>9}  {:>7}  {:>6}  {:>5}  {:>7.1}",
                stats.comic_id,
                stats.purchases,
                stats.revenue,
                stats.views,
                stats.favorites,
                stats.average_rating
            );
        }
    }
}

pub async fn execute(client: &Client, base_url: &str, human: bool, args: AnalyticsArgs) -> Result<()> {
    let mut top = client.get(format!("{base_url}/api/admin/analytics/top"));
    if let Some(limit) = args.limit {
        top = top.query(&[("limit", limit)]);
    }
    let top_comics: Vec<ComicStats> = make_request(top).await?;
    let revenue: RevenueResponse =
        make_request(client.get(format!("{base_url}/api/admin/analytics/revenue"))).await?;

    let report = AnalyticsReport {
        total_revenue: revenue.total_revenue,
        top_comics,
    };
    output(&report, human)
}
