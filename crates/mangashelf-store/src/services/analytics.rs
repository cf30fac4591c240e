use mangashelf_core::{AnalyticsDelta, AnalyticsRecord, ComicId, RatingSummary, UserId};

use super::identity::AdminGuard;
use super::Ctx;
use crate::error::StoreResult;

/// Default length of the top comics board.
pub const DEFAULT_TOP_COMICS: usize = 10;

/// Per-comic counters. Every write upserts the record.
#[derive(Clone)]
pub struct Analytics {
    ctx: Ctx,
    admins: AdminGuard,
}

impl Analytics {
    pub(crate) fn new(ctx: Ctx, admins: AdminGuard) -> Self {
        Self { ctx, admins }
    }

    pub async fn increment_views(&self, comic_id: ComicId) -> StoreResult<AnalyticsRecord> {
        self.apply(comic_id, AnalyticsDelta::view()).await
    }

    pub async fn adjust_favorites(&self, comic_id: ComicId, delta: i64) -> StoreResult<AnalyticsRecord> {
        self.apply(comic_id, AnalyticsDelta::favorites(delta)).await
    }

    /// Counts a purchase made outside [`crate::Purchases`], which records its
    /// own purchases atomically.
    pub async fn record_purchase(&self, comic_id: ComicId, revenue: i64) -> StoreResult<AnalyticsRecord> {
        self.apply(comic_id, AnalyticsDelta::purchase(revenue)).await
    }

    async fn apply(&self, comic_id: ComicId, delta: AnalyticsDelta) -> StoreResult<AnalyticsRecord> {
        self.ctx
            .backend
            .apply_analytics(comic_id, &delta, self.ctx.now())
            .await
    }

    /// Re-derives the average from every review of the comic.
    pub async fn recompute_average_rating(&self, comic_id: ComicId) -> StoreResult<AnalyticsRecord> {
        let reviews = self.ctx.backend.list_reviews(comic_id).await?;
        let summary = RatingSummary::from_ratings(reviews.iter().map(|r| r.rating));
        tracing::debug!(
            comic_id = %comic_id,
            average = summary.average,
            count = summary.count,
            "Average rating recomputed"
        );
        self.ctx
            .backend
            .set_average_rating(comic_id, summary.average, self.ctx.now())
            .await
    }

    pub async fn get(&self, comic_id: ComicId) -> StoreResult<Option<AnalyticsRecord>> {
        self.ctx.backend.get_analytics(comic_id).await
    }

    /// Most purchased first; `limit` defaults to 10.
    pub async fn top_comics(&self, admin: &UserId, limit: Option<usize>) -> StoreResult<Vec<AnalyticsRecord>> {
        self.admins.authorize(admin).await?;
        let mut records = self.ctx.backend.list_analytics().await?;
        records.sort_by(|a, b| b.purchases.cmp(&a.purchases));
        records.truncate(limit.unwrap_or(DEFAULT_TOP_COMICS));
        Ok(records)
    }

    pub async fn total_revenue(&self, admin: &UserId) -> StoreResult<i64> {
        self.admins.authorize(admin).await?;
        let records = self.ctx.backend.list_analytics().await?;
        Ok(records.iter().map(|r| r.revenue).sum())
    }
}
