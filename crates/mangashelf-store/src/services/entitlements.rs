use mangashelf_core::{ChapterId, ComicId, UserId};

use super::Ctx;
use crate::error::StoreResult;
use crate::rules;

/// Answers whether a user may read a comic or chapter.
///
/// A dangling comic or chapter reference means no access, not an error.
#[derive(Clone)]
pub struct Entitlements {
    ctx: Ctx,
}

impl Entitlements {
    pub(crate) fn new(ctx: Ctx) -> Self {
        Self { ctx }
    }

    pub async fn has_comic_access(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        let Some(comic) = self.ctx.backend.get_comic(comic_id).await? else {
            return Ok(false);
        };
        if comic.is_free() {
            return Ok(true);
        }
        self.ctx.backend.has_purchase(user_id, comic_id).await
    }

    pub async fn has_chapter_access(
        &self,
        user_id: &UserId,
        chapter_id: ChapterId,
    ) -> StoreResult<bool> {
        let Some(chapter) = self.ctx.backend.get_chapter(chapter_id).await? else {
            return Ok(false);
        };
        if self.ctx.backend.get_comic(chapter.comic_id).await?.is_none() {
            return Ok(false);
        }
        if rules::chapter_access(chapter.price, false, false) {
            return Ok(true);
        }

        let owns_comic = self
            .ctx
            .backend
            .has_purchase(user_id, chapter.comic_id)
            .await?;
        let owns_chapter = !owns_comic
            && self
                .ctx
                .backend
                .has_chapter_purchase(user_id, chapter_id)
                .await?;
        Ok(rules::chapter_access(chapter.price, owns_comic, owns_chapter))
    }

    pub async fn has_purchased(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        self.ctx.backend.has_purchase(user_id, comic_id).await
    }

    pub async fn has_purchased_chapter(
        &self,
        user_id: &UserId,
        chapter_id: ChapterId,
    ) -> StoreResult<bool> {
        self.ctx.backend.has_chapter_purchase(user_id, chapter_id).await
    }
}
