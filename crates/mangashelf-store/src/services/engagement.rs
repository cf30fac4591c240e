//! Favorites, reviews, reading state and reserved usernames.

use chrono::{DateTime, Utc};
use mangashelf_core::{
    normalize_username, ChapterId, Comic, ComicId, RatingSummary, ReadingProgress,
    ReservedUsername, ReservedUsernameId, Review, ReviewId, UserId,
};
use serde::Serialize;

use super::analytics::Analytics;
use super::bans::BanGate;
use super::identity::AdminGuard;
use super::Ctx;
use crate::error::{StoreError, StoreResult};
use crate::rules;

pub const DEFAULT_CONTINUE_READING: usize = 5;
pub const DEFAULT_RECENTLY_READ: usize = 10;

async fn require_comic(ctx: &Ctx, comic_id: ComicId) -> StoreResult<Comic> {
    ctx.backend
        .get_comic(comic_id)
        .await?
        .ok_or_else(|| StoreError::not_found("comic", comic_id))
}

// ==================== Favorites ====================

#[derive(Clone)]
pub struct Favorites {
    ctx: Ctx,
    bans: BanGate,
    analytics: Analytics,
}

impl Favorites {
    pub(crate) fn new(ctx: Ctx, bans: BanGate, analytics: Analytics) -> Self {
        Self {
            ctx,
            bans,
            analytics,
        }
    }

    /// Returns whether the comic is favorited after the toggle.
    pub async fn toggle(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        self.bans.ensure_not_banned(user_id).await?;
        require_comic(&self.ctx, comic_id).await?;

        let favorited = self
            .ctx
            .backend
            .toggle_favorite(user_id, comic_id, self.ctx.now())
            .await?;
        self.analytics
            .adjust_favorites(comic_id, if favorited { 1 } else { -1 })
            .await?;
        tracing::debug!(user_id = %user_id, comic_id = %comic_id, favorited, "Favorite toggled");
        Ok(favorited)
    }

    pub async fn is_favorited(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        self.ctx.backend.is_favorited(user_id, comic_id).await
    }

    /// Favorited comics, most recent first.
    pub async fn user_favorites(&self, user_id: &UserId) -> StoreResult<Vec<Comic>> {
        let favorites = self.ctx.backend.list_favorites(user_id).await?;
        let mut comics = Vec::with_capacity(favorites.len());
        for favorite in favorites {
            if let Some(comic) = self.ctx.backend.get_comic(favorite.comic_id).await? {
                comics.push(comic);
            }
        }
        Ok(comics)
    }

    pub async fn favorite_count(&self, comic_id: ComicId) -> StoreResult<i64> {
        self.ctx.backend.count_favorites(comic_id).await
    }
}

// ==================== Reviews ====================

#[derive(Clone)]
pub struct Reviews {
    ctx: Ctx,
    bans: BanGate,
    analytics: Analytics,
}

impl Reviews {
    pub(crate) fn new(ctx: Ctx, bans: BanGate, analytics: Analytics) -> Self {
        Self {
            ctx,
            bans,
            analytics,
        }
    }

    /// Writes or replaces the user's review of the comic and refreshes the
    /// comic's average rating.
    pub async fn submit(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        rating: i16,
        comment: &str,
    ) -> StoreResult<Review> {
        rules::validate_rating(rating)?;
        self.bans.ensure_not_banned(user_id).await?;
        require_comic(&self.ctx, comic_id).await?;

        let now = self.ctx.now();
        let review = self
            .ctx
            .backend
            .upsert_review(&Review {
                id: ReviewId::new(),
                user_id: user_id.clone(),
                comic_id,
                rating,
                comment: comment.trim().to_string(),
                created_at: now,
                updated_at: now,
            })
            .await?;
        self.analytics.recompute_average_rating(comic_id).await?;
        tracing::debug!(user_id = %user_id, comic_id = %comic_id, rating, "Review submitted");
        Ok(review)
    }

    /// Newest first.
    pub async fn list_for_comic(&self, comic_id: ComicId) -> StoreResult<Vec<Review>> {
        self.ctx.backend.list_reviews(comic_id).await
    }

    pub async fn user_review(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<Option<Review>> {
        self.ctx.backend.get_review(user_id, comic_id).await
    }

    pub async fn average_rating(&self, comic_id: ComicId) -> StoreResult<RatingSummary> {
        let reviews = self.ctx.backend.list_reviews(comic_id).await?;
        Ok(RatingSummary::from_ratings(reviews.iter().map(|r| r.rating)))
    }
}

// ==================== Reading ====================

/// A comic in progress with its latest reading position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinueReading {
    pub comic: Comic,
    pub progress: ReadingProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentlyRead {
    pub comic: Comic,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_read_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Reading {
    ctx: Ctx,
    bans: BanGate,
}

impl Reading {
    pub(crate) fn new(ctx: Ctx, bans: BanGate) -> Self {
        Self { ctx, bans }
    }

    pub async fn update_progress(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        chapter_id: ChapterId,
        current_page: i32,
        total_pages: i32,
    ) -> StoreResult<ReadingProgress> {
        self.bans.ensure_not_banned(user_id).await?;
        let progress = ReadingProgress {
            user_id: user_id.clone(),
            comic_id,
            chapter_id,
            current_page,
            total_pages,
            last_read_at: self.ctx.now(),
        };
        self.ctx.backend.upsert_progress(&progress).await?;
        Ok(progress)
    }

    /// Latest position in the comic.
    pub async fn get_progress(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
    ) -> StoreResult<Option<ReadingProgress>> {
        self.ctx.backend.latest_progress(user_id, comic_id).await
    }

    /// One entry per comic, most recently read first; `limit` defaults to 5.
    pub async fn continue_reading(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ContinueReading>> {
        let limit = limit.unwrap_or(DEFAULT_CONTINUE_READING);
        // Several chapters of one comic may be in progress; over-fetch and
        // keep the latest per comic.
        let rows = self
            .ctx
            .backend
            .recent_progress(user_id, limit.saturating_mul(4))
            .await?;

        let mut seen = Vec::new();
        let mut entries = Vec::new();
        for progress in rows {
            if entries.len() == limit {
                break;
            }
            if seen.contains(&progress.comic_id) {
                continue;
            }
            seen.push(progress.comic_id);
            if let Some(comic) = self.ctx.backend.get_comic(progress.comic_id).await? {
                entries.push(ContinueReading { comic, progress });
            }
        }
        Ok(entries)
    }

    pub async fn add_to_history(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<()> {
        self.bans.ensure_not_banned(user_id).await?;
        self.ctx
            .backend
            .touch_history(user_id, comic_id, self.ctx.now())
            .await
    }

    /// Most recent first; `limit` defaults to 10.
    pub async fn recently_read(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<RecentlyRead>> {
        let history = self
            .ctx
            .backend
            .recent_history(user_id, limit.unwrap_or(DEFAULT_RECENTLY_READ))
            .await?;
        let mut entries = Vec::with_capacity(history.len());
        for entry in history {
            if let Some(comic) = self.ctx.backend.get_comic(entry.comic_id).await? {
                entries.push(RecentlyRead {
                    comic,
                    last_read_at: entry.last_read_at,
                });
            }
        }
        Ok(entries)
    }
}

// ==================== Reserved usernames ====================

#[derive(Clone)]
pub struct ReservedUsernames {
    ctx: Ctx,
    admins: AdminGuard,
}

impl ReservedUsernames {
    pub(crate) fn new(ctx: Ctx, admins: AdminGuard) -> Self {
        Self { ctx, admins }
    }

    pub async fn is_reserved(&self, username: &str) -> StoreResult<bool> {
        self.ctx
            .backend
            .is_reserved(&normalize_username(username))
            .await
    }

    /// Alphabetical.
    pub async fn list(&self) -> StoreResult<Vec<ReservedUsername>> {
        self.ctx.backend.list_reserved().await
    }

    pub async fn add(&self, admin: &UserId, username: &str) -> StoreResult<ReservedUsername> {
        let capability = self.admins.authorize(admin).await?;
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(StoreError::InvalidUsername(username));
        }
        let reserved = ReservedUsername {
            id: ReservedUsernameId::new(),
            username,
            created_at: self.ctx.now(),
            created_by: capability.admin().clone(),
        };
        self.ctx.backend.insert_reserved(&reserved).await?;
        tracing::info!(admin = %reserved.created_by, username = %reserved.username, "Username reserved");
        Ok(reserved)
    }

    pub async fn remove(&self, admin: &UserId, id: ReservedUsernameId) -> StoreResult<()> {
        self.admins.authorize(admin).await?;
        self.ctx.backend.delete_reserved(id).await
    }
}
