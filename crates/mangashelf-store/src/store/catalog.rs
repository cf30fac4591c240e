//! Catalog port over PostgreSQL.

use async_trait::async_trait;

use mangashelf_core::{
    Chapter, ChapterId, CoinPackage, CoinPackageId, Comic, ComicId, FeaturedId, FeaturedSlot,
    Page, PageId,
};

use super::{expect_affected, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{ChapterRow, CoinPackageRow, ComicRow, FeaturedRow, PageRow};
use crate::ports::Catalog;

const COMIC_COLUMNS: &str = "id, title, description, cover_image, price, author, genre, category, created_at, updated_at";
const CHAPTER_COLUMNS: &str = "id, comic_id, chapter_number, title, price, created_at, updated_at";
const FEATURED_COLUMNS: &str = "id, comic_id, priority, start_date, end_date, active";
const PACKAGE_COLUMNS: &str = "id, name, coins, price, bonus, popular, active";

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Fails with `NotFound` when the referenced comic is missing.
fn missing_comic(err: sqlx::Error, comic_id: ComicId) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::not_found("comic", comic_id)
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Catalog for Store {
    // ==================== Comics ====================

    async fn get_comic(&self, id: ComicId) -> StoreResult<Option<Comic>> {
        let row = sqlx::query_as::<_, ComicRow>(&format!(
            "SELECT {COMIC_COLUMNS} FROM comics WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Comic::from))
    }

    async fn list_comics(&self, category: Option<&str>) -> StoreResult<Vec<Comic>> {
        let rows = sqlx::query_as::<_, ComicRow>(&format!(
            r#"
            SELECT {COMIC_COLUMNS} FROM comics
            WHERE $1::TEXT IS NULL OR category = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comic::from).collect())
    }

    async fn search_comics(&self, query: &str, category: Option<&str>) -> StoreResult<Vec<Comic>> {
        let rows = sqlx::query_as::<_, ComicRow>(&format!(
            r#"
            SELECT {COMIC_COLUMNS} FROM comics
            WHERE title ILIKE $1
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(like_pattern(query))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comic::from).collect())
    }

    async fn insert_comic(&self, comic: &Comic) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comics (id, title, description, cover_image, price, author, genre, category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*comic.id.as_uuid())
        .bind(&comic.title)
        .bind(&comic.description)
        .bind(&comic.cover_image)
        .bind(comic.price)
        .bind(&comic.author)
        .bind(&comic.genre)
        .bind(&comic.category)
        .bind(comic.created_at)
        .bind(comic.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_comic(&self, comic: &Comic) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE comics SET
                title = $2, description = $3, cover_image = $4, price = $5,
                author = $6, genre = $7, category = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(*comic.id.as_uuid())
        .bind(&comic.title)
        .bind(&comic.description)
        .bind(&comic.cover_image)
        .bind(comic.price)
        .bind(&comic.author)
        .bind(&comic.genre)
        .bind(&comic.category)
        .bind(comic.updated_at)
        .execute(&self.pool)
        .await?;
        expect_affected(result, "comic", comic.id)
    }

    async fn delete_comic(&self, id: ComicId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM comics WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        expect_affected(result, "comic", id)
    }

    // ==================== Chapters ====================

    async fn get_chapter(&self, id: ChapterId) -> StoreResult<Option<Chapter>> {
        let row = sqlx::query_as::<_, ChapterRow>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Chapter::from))
    }

    async fn list_chapters(&self, comic_id: ComicId) -> StoreResult<Vec<Chapter>> {
        let rows = sqlx::query_as::<_, ChapterRow>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE comic_id = $1 ORDER BY chapter_number ASC"
        ))
        .bind(*comic_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Chapter::from).collect())
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chapters (id, comic_id, chapter_number, title, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*chapter.id.as_uuid())
        .bind(*chapter.comic_id.as_uuid())
        .bind(chapter.chapter_number)
        .bind(&chapter.title)
        .bind(chapter.price)
        .bind(chapter.created_at)
        .bind(chapter.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_comic(e, chapter.comic_id))?;
        Ok(())
    }

    async fn update_chapter(&self, chapter: &Chapter) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE chapters SET chapter_number = $2, title = $3, price = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(*chapter.id.as_uuid())
        .bind(chapter.chapter_number)
        .bind(&chapter.title)
        .bind(chapter.price)
        .bind(chapter.updated_at)
        .execute(&self.pool)
        .await?;
        expect_affected(result, "chapter", chapter.id)
    }

    async fn delete_chapter(&self, id: ChapterId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        expect_affected(result, "chapter", id)
    }

    // ==================== Pages ====================

    async fn list_pages(&self, chapter_id: ChapterId) -> StoreResult<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(
            r#"
            SELECT id, chapter_id, page_number, image_url FROM pages
            WHERE chapter_id = $1
            ORDER BY page_number ASC
            "#,
        )
        .bind(*chapter_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Page::from).collect())
    }

    async fn insert_page(&self, page: &Page) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO pages (id, chapter_id, page_number, image_url) VALUES ($1, $2, $3, $4)",
        )
        .bind(*page.id.as_uuid())
        .bind(*page.chapter_id.as_uuid())
        .bind(page.page_number)
        .bind(&page.image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::not_found("chapter", page.chapter_id)
            }
            _ => StoreError::Database(e),
        })?;
        Ok(())
    }

    async fn delete_page(&self, id: PageId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        expect_affected(result, "page", id)
    }

    // ==================== Featured ====================

    async fn list_featured(&self) -> StoreResult<Vec<FeaturedSlot>> {
        let rows = sqlx::query_as::<_, FeaturedRow>(&format!(
            "SELECT {FEATURED_COLUMNS} FROM featured WHERE active ORDER BY priority DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeaturedSlot::from).collect())
    }

    async fn insert_featured(&self, slot: &FeaturedSlot) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO featured (id, comic_id, priority, start_date, end_date, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*slot.id.as_uuid())
        .bind(*slot.comic_id.as_uuid())
        .bind(slot.priority)
        .bind(slot.start_date)
        .bind(slot.end_date)
        .bind(slot.active)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_comic(e, slot.comic_id))?;
        Ok(())
    }

    async fn deactivate_featured(&self, id: FeaturedId) -> StoreResult<()> {
        let result = sqlx::query("UPDATE featured SET active = FALSE WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        expect_affected(result, "featured slot", id)
    }

    // ==================== Coin packages ====================

    async fn get_coin_package(&self, id: CoinPackageId) -> StoreResult<Option<CoinPackage>> {
        let row = sqlx::query_as::<_, CoinPackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM coin_packages WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CoinPackage::from))
    }

    async fn list_coin_packages(&self, include_inactive: bool) -> StoreResult<Vec<CoinPackage>> {
        let rows = sqlx::query_as::<_, CoinPackageRow>(&format!(
            "SELECT {PACKAGE_COLUMNS} FROM coin_packages WHERE $1 OR active ORDER BY coins ASC"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CoinPackage::from).collect())
    }

    async fn insert_coin_package(&self, package: &CoinPackage) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coin_packages (id, name, coins, price, bonus, popular, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*package.id.as_uuid())
        .bind(&package.name)
        .bind(package.coins)
        .bind(package.price)
        .bind(package.bonus)
        .bind(package.popular)
        .bind(package.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_coin_package(&self, package: &CoinPackage) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE coin_packages SET
                name = $2, coins = $3, price = $4, bonus = $5, popular = $6, active = $7
            WHERE id = $1
            "#,
        )
        .bind(*package.id.as_uuid())
        .bind(&package.name)
        .bind(package.coins)
        .bind(package.price)
        .bind(package.bonus)
        .bind(package.popular)
        .bind(package.active)
        .execute(&self.pool)
        .await?;
        expect_affected(result, "coin package", package.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("one piece"), "%one piece%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }
}
