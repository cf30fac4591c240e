//! Admin-managed catalog: comics, chapters, pages, featured slots and coin
//! packages.

use chrono::{DateTime, Utc};
use mangashelf_core::{
    Chapter, ChapterId, ChapterPatch, CoinPackage, CoinPackageId, CoinPackagePatch, Comic,
    ComicDraft, ComicId, FeaturedId, FeaturedSlot, NewNotification, NotificationKind, Page, PageId,
    UserId,
};
use serde::{Deserialize, Serialize};

use super::bans::BanGate;
use super::entitlements::Entitlements;
use super::identity::AdminGuard;
use super::notifications::Notifications;
use super::Ctx;
use crate::error::{StoreError, StoreResult};
use crate::rules;

/// Fields of a chapter to add to a comic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChapter {
    pub chapter_number: i32,
    pub title: String,
    #[serde(default)]
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoinPackage {
    pub name: String,
    pub coins: i64,
    pub price: i64,
    #[serde(default)]
    pub bonus: i64,
    #[serde(default)]
    pub popular: bool,
}

/// A live featured slot with its comic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeaturedComic {
    pub slot: FeaturedSlot,
    pub comic: Comic,
}

#[derive(Clone)]
pub struct CatalogService {
    ctx: Ctx,
    admins: AdminGuard,
    bans: BanGate,
    entitlements: Entitlements,
    notifications: Notifications,
}

impl CatalogService {
    pub(crate) fn new(
        ctx: Ctx,
        admins: AdminGuard,
        bans: BanGate,
        entitlements: Entitlements,
        notifications: Notifications,
    ) -> Self {
        Self {
            ctx,
            admins,
            bans,
            entitlements,
            notifications,
        }
    }

    // ==================== Comics ====================

    pub async fn list_comics(&self, category: Option<&str>) -> StoreResult<Vec<Comic>> {
        self.ctx.backend.list_comics(category).await
    }

    pub async fn search_comics(&self, query: &str, category: Option<&str>) -> StoreResult<Vec<Comic>> {
        self.ctx.backend.search_comics(query.trim(), category).await
    }

    pub async fn get_comic(&self, id: ComicId) -> StoreResult<Comic> {
        self.ctx
            .backend
            .get_comic(id)
            .await?
            .ok_or_else(|| StoreError::not_found("comic", id))
    }

    pub async fn create_comic(&self, admin: &UserId, draft: ComicDraft) -> StoreResult<Comic> {
        self.admins.authorize(admin).await?;
        rules::validate_price(draft.price)?;
        let comic = draft.into_comic(ComicId::new(), self.ctx.now());
        self.ctx.backend.insert_comic(&comic).await?;
        tracing::info!(comic_id = %comic.id, title = %comic.title, "Comic created");
        Ok(comic)
    }

    pub async fn update_comic(&self, admin: &UserId, id: ComicId, draft: ComicDraft) -> StoreResult<Comic> {
        self.admins.authorize(admin).await?;
        rules::validate_price(draft.price)?;
        let mut comic = self.get_comic(id).await?;
        draft.apply_to(&mut comic, self.ctx.now());
        self.ctx.backend.update_comic(&comic).await?;
        tracing::info!(comic_id = %id, "Comic updated");
        Ok(comic)
    }

    /// Removes the comic with its chapters, pages and featured slots.
    pub async fn delete_comic(&self, admin: &UserId, id: ComicId) -> StoreResult<()> {
        self.admins.authorize(admin).await?;
        self.ctx.backend.delete_comic(id).await?;
        tracing::info!(comic_id = %id, "Comic deleted");
        Ok(())
    }

    // ==================== Chapters ====================

    /// Ordered by chapter number.
    pub async fn list_chapters(&self, comic_id: ComicId) -> StoreResult<Vec<Chapter>> {
        self.ctx.backend.list_chapters(comic_id).await
    }

    pub async fn get_chapter(&self, id: ChapterId) -> StoreResult<Chapter> {
        self.ctx
            .backend
            .get_chapter(id)
            .await?
            .ok_or_else(|| StoreError::not_found("chapter", id))
    }

    /// Adds a chapter and tells everyone who favorited the comic.
    pub async fn create_chapter(
        &self,
        admin: &UserId,
        comic_id: ComicId,
        new: NewChapter,
    ) -> StoreResult<Chapter> {
        self.admins.authorize(admin).await?;
        rules::validate_price(new.price)?;
        let comic = self.get_comic(comic_id).await?;

        let now = self.ctx.now();
        let chapter = Chapter {
            id: ChapterId::new(),
            comic_id,
            chapter_number: new.chapter_number,
            title: new.title,
            price: new.price,
            created_at: now,
            updated_at: now,
        };
        self.ctx.backend.insert_chapter(&chapter).await?;
        tracing::info!(
            comic_id = %comic_id,
            chapter_id = %chapter.id,
            chapter_number = chapter.chapter_number,
            "Chapter created"
        );

        let followers = self.ctx.backend.favoriters(comic_id).await?;
        for user_id in followers {
            let notice = NewNotification {
                user_id: user_id.clone(),
                kind: NotificationKind::NewChapter,
                title: format!("New chapter of {}", comic.title),
                message: format!("Chapter {}: {} is out.", chapter.chapter_number, chapter.title),
                link: Some(format!("/comics/{comic_id}")),
            };
            if let Err(e) = self.notifications.create(notice).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to write chapter notification");
            }
        }
        Ok(chapter)
    }

    pub async fn update_chapter(
        &self,
        admin: &UserId,
        id: ChapterId,
        patch: ChapterPatch,
    ) -> StoreResult<Chapter> {
        self.admins.authorize(admin).await?;
        if let Some(price) = patch.price {
            rules::validate_price(price)?;
        }
        let mut chapter = self.get_chapter(id).await?;
        patch.apply_to(&mut chapter, self.ctx.now());
        self.ctx.backend.update_chapter(&chapter).await?;
        Ok(chapter)
    }

    /// Removes the chapter and its pages.
    pub async fn delete_chapter(&self, admin: &UserId, id: ChapterId) -> StoreResult<()> {
        self.admins.authorize(admin).await?;
        self.ctx.backend.delete_chapter(id).await?;
        tracing::info!(chapter_id = %id, "Chapter deleted");
        Ok(())
    }

    // ==================== Pages ====================

    /// Pages of a chapter the user may read, ordered by page number.
    ///
    /// Admins read every chapter.
    pub async fn read_pages(&self, user_id: &UserId, chapter_id: ChapterId) -> StoreResult<Vec<Page>> {
        self.bans.ensure_not_banned(user_id).await?;
        self.get_chapter(chapter_id).await?;

        let allowed = self.entitlements.has_chapter_access(user_id, chapter_id).await?
            || self.admins.is_admin(user_id).await?;
        if !allowed {
            return Err(StoreError::NotEntitled(chapter_id.to_string()));
        }
        self.ctx.backend.list_pages(chapter_id).await
    }

    pub async fn add_page(
        &self,
        admin: &UserId,
        chapter_id: ChapterId,
        page_number: i32,
        image_url: &str,
    ) -> StoreResult<Page> {
        self.admins.authorize(admin).await?;
        self.get_chapter(chapter_id).await?;
        let page = Page {
            id: PageId::new(),
            chapter_id,
            page_number,
            image_url: image_url.to_string(),
        };
        self.ctx.backend.insert_page(&page).await?;
        Ok(page)
    }

    pub async fn remove_page(&self, admin: &UserId, id: PageId) -> StoreResult<()> {
        self.admins.authorize(admin).await?;
        self.ctx.backend.delete_page(id).await
    }

    // ==================== Featured ====================

    /// Comics of the slots live now, highest priority first.
    pub async fn list_featured(&self) -> StoreResult<Vec<FeaturedComic>> {
        let now = self.ctx.now();
        let mut featured = Vec::new();
        for slot in self.ctx.backend.list_featured().await? {
            if !slot.is_live(now) {
                continue;
            }
            if let Some(comic) = self.ctx.backend.get_comic(slot.comic_id).await? {
                featured.push(FeaturedComic { slot, comic });
            }
        }
        Ok(featured)
    }

    pub async fn add_featured(
        &self,
        admin: &UserId,
        comic_id: ComicId,
        priority: i32,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
    ) -> StoreResult<FeaturedSlot> {
        self.admins.authorize(admin).await?;
        self.get_comic(comic_id).await?;
        let slot = FeaturedSlot {
            id: FeaturedId::new(),
            comic_id,
            priority,
            start_date,
            end_date,
            active: true,
        };
        self.ctx.backend.insert_featured(&slot).await?;
        Ok(slot)
    }

    /// Soft removal; the slot stays on record as inactive.
    pub async fn remove_featured(&self, admin: &UserId, id: FeaturedId) -> StoreResult<()> {
        self.admins.authorize(admin).await?;
        self.ctx.backend.deactivate_featured(id).await
    }

    // ==================== Coin packages ====================

    /// Active packages, smallest first.
    pub async fn list_coin_packages(&self) -> StoreResult<Vec<CoinPackage>> {
        self.ctx.backend.list_coin_packages(false).await
    }

    pub async fn create_coin_package(&self, admin: &UserId, new: NewCoinPackage) -> StoreResult<CoinPackage> {
        self.admins.authorize(admin).await?;
        rules::validate_amount(new.coins)?;
        rules::validate_price(new.price)?;
        let package = CoinPackage {
            id: CoinPackageId::new(),
            name: new.name,
            coins: new.coins,
            price: new.price,
            bonus: new.bonus,
            popular: new.popular,
            active: true,
        };
        self.ctx.backend.insert_coin_package(&package).await?;
        Ok(package)
    }

    pub async fn update_coin_package(
        &self,
        admin: &UserId,
        id: CoinPackageId,
        patch: CoinPackagePatch,
    ) -> StoreResult<CoinPackage> {
        self.admins.authorize(admin).await?;
        if let Some(coins) = patch.coins {
            rules::validate_amount(coins)?;
        }
        if let Some(price) = patch.price {
            rules::validate_price(price)?;
        }
        let mut package = self
            .ctx
            .backend
            .get_coin_package(id)
            .await?
            .ok_or_else(|| StoreError::not_found("coin package", id))?;
        patch.apply_to(&mut package);
        self.ctx.backend.update_coin_package(&package).await?;
        Ok(package)
    }
}
