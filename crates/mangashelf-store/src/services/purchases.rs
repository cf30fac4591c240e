//! Purchase orchestration.
//!
//! The service looks up prices and titles and screens the caller; the
//! backend's `commit_purchase` performs the ownership checks, debit,
//! transaction, analytics and entitlement as one unit under the user's lock.

use mangashelf_core::{
    Chapter, ChapterId, Comic, ComicId, NewNotification, NotificationKind, UserId,
};

use super::bans::BanGate;
use super::notifications::Notifications;
use super::Ctx;
use crate::error::{StoreError, StoreResult};
use crate::ports::{PurchaseItem, PurchaseOrder, Receipt};
use crate::rules;

#[derive(Clone)]
pub struct Purchases {
    ctx: Ctx,
    bans: BanGate,
    notifications: Notifications,
    low_balance_threshold: i64,
}

impl Purchases {
    pub(crate) fn new(
        ctx: Ctx,
        bans: BanGate,
        notifications: Notifications,
        low_balance_threshold: i64,
    ) -> Self {
        Self {
            ctx,
            bans,
            notifications,
            low_balance_threshold,
        }
    }

    pub async fn purchase_comic(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<Receipt> {
        self.bans.ensure_not_banned(user_id).await?;

        if self.ctx.backend.has_purchase(user_id, comic_id).await? {
            return Err(StoreError::AlreadyPurchased);
        }
        let comic = self
            .ctx
            .backend
            .get_comic(comic_id)
            .await?
            .ok_or_else(|| StoreError::not_found("comic", comic_id))?;

        let order = PurchaseOrder {
            user_id: user_id.clone(),
            item: PurchaseItem::Comic(comic_id),
            price: comic.price,
            description: rules::comic_purchase_description(&comic.title),
        };
        let receipt = self.ctx.backend.commit_purchase(&order, self.ctx.now()).await?;

        tracing::info!(
            user_id = %user_id,
            comic_id = %comic_id,
            price = comic.price,
            balance = receipt.balance,
            "Comic purchased"
        );
        self.after_purchase(user_id, &comic.title, comic.price, receipt.balance)
            .await;
        Ok(receipt)
    }

    pub async fn purchase_chapter(
        &self,
        user_id: &UserId,
        chapter_id: ChapterId,
    ) -> StoreResult<Receipt> {
        self.bans.ensure_not_banned(user_id).await?;

        if self
            .ctx
            .backend
            .has_chapter_purchase(user_id, chapter_id)
            .await?
        {
            return Err(StoreError::AlreadyPurchased);
        }
        let chapter = self
            .ctx
            .backend
            .get_chapter(chapter_id)
            .await?
            .ok_or_else(|| StoreError::not_found("chapter", chapter_id))?;
        let comic = self
            .ctx
            .backend
            .get_comic(chapter.comic_id)
            .await?
            .ok_or_else(|| StoreError::not_found("comic", chapter.comic_id))?;
        if self.ctx.backend.has_purchase(user_id, comic.id).await? {
            return Err(StoreError::AlreadyOwnsComic);
        }

        let order = PurchaseOrder {
            user_id: user_id.clone(),
            item: PurchaseItem::Chapter {
                chapter_id,
                comic_id: comic.id,
            },
            price: chapter.price,
            description: rules::chapter_purchase_description(
                &comic.title,
                chapter.chapter_number,
                &chapter.title,
            ),
        };
        let receipt = self.ctx.backend.commit_purchase(&order, self.ctx.now()).await?;

        tracing::info!(
            user_id = %user_id,
            comic_id = %comic.id,
            chapter_id = %chapter_id,
            price = chapter.price,
            balance = receipt.balance,
            "Chapter purchased"
        );
        let label = format!("{} chapter {}", comic.title, chapter.chapter_number);
        self.after_purchase(user_id, &label, chapter.price, receipt.balance)
            .await;
        Ok(receipt)
    }

    /// Purchase and low-balance notices. The purchase is already committed,
    /// so failures here are only logged.
    async fn after_purchase(&self, user_id: &UserId, item: &str, price: i64, balance: i64) {
        if price == 0 {
            return;
        }

        let mut notices = vec![NewNotification {
            user_id: user_id.clone(),
            kind: NotificationKind::Purchase,
            title: "Purchase complete".to_string(),
            message: format!("You bought {item} for {price} coins."),
            link: None,
        }];
        if balance < self.low_balance_threshold {
            notices.push(NewNotification {
                user_id: user_id.clone(),
                kind: NotificationKind::LowBalance,
                title: "Low balance".to_string(),
                message: format!("Only {balance} coins left in your wallet."),
                link: Some("/coins".to_string()),
            });
        }

        for notice in notices {
            if let Err(e) = self.notifications.create(notice).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to write purchase notification");
            }
        }
    }

    /// Comics the user owns outright, most recent purchase first.
    pub async fn user_purchases(&self, user_id: &UserId) -> StoreResult<Vec<Comic>> {
        let purchases = self.ctx.backend.list_purchases(user_id).await?;
        let mut comics = Vec::with_capacity(purchases.len());
        for purchase in purchases {
            if let Some(comic) = self.ctx.backend.get_comic(purchase.comic_id).await? {
                comics.push(comic);
            }
        }
        Ok(comics)
    }

    /// Chapters bought one by one, most recent purchase first.
    pub async fn user_chapter_purchases(&self, user_id: &UserId) -> StoreResult<Vec<Chapter>> {
        let purchases = self.ctx.backend.list_chapter_purchases(user_id).await?;
        let mut chapters = Vec::with_capacity(purchases.len());
        for purchase in purchases {
            if let Some(chapter) = self.ctx.backend.get_chapter(purchase.chapter_id).await? {
                chapters.push(chapter);
            }
        }
        Ok(chapters)
    }
}
