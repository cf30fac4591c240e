//! Engagement port over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mangashelf_core::{
    ComicId, Favorite, HistoryEntry, Notification, NotificationId, ReadingProgress,
    ReservedUsername, ReservedUsernameId, Review, UserId,
};

use super::{expect_affected, on_unique_violation, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    try_collect, FavoriteRow, HistoryRow, NotificationRow, ProgressRow, ReservedUsernameRow,
    ReviewRow,
};
use crate::ports::Engagement;

const REVIEW_COLUMNS: &str = "id, user_id, comic_id, rating, comment, created_at, updated_at";
const PROGRESS_COLUMNS: &str =
    "user_id, comic_id, chapter_id, current_page, total_pages, last_read_at";
const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, read, link, created_at";

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl Engagement for Store {
    // ==================== Favorites ====================

    async fn toggle_favorite(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND comic_id = $2")
            .bind(user_id.as_str())
            .bind(*comic_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO favorites (user_id, comic_id, created_at) VALUES ($1, $2, $3)
                ON CONFLICT (user_id, comic_id) DO NOTHING
                "#,
            )
            .bind(user_id.as_str())
            .bind(*comic_id.as_uuid())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(removed.rows_affected() == 0)
    }

    async fn is_favorited(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        let found: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND comic_id = $2)",
        )
        .bind(user_id.as_str())
        .bind(*comic_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(found.0)
    }

    async fn list_favorites(&self, user_id: &UserId) -> StoreResult<Vec<Favorite>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT user_id, comic_id, created_at FROM favorites
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Favorite::from).collect())
    }

    async fn favoriters(&self, comic_id: ComicId) -> StoreResult<Vec<UserId>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT user_id FROM favorites WHERE comic_id = $1")
                .bind(*comic_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| UserId(id)).collect())
    }

    async fn count_favorites(&self, comic_id: ComicId) -> StoreResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM favorites WHERE comic_id = $1")
            .bind(*comic_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    // ==================== Reviews ====================

    async fn upsert_review(&self, review: &Review) -> StoreResult<Review> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            INSERT INTO reviews (id, user_id, comic_id, rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, comic_id) DO UPDATE SET
                rating = $4, comment = $5, updated_at = $7
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(*review.id.as_uuid())
        .bind(review.user_id.as_str())
        .bind(*review.comic_id.as_uuid())
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_review(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = $1 AND comic_id = $2"
        ))
        .bind(user_id.as_str())
        .bind(*comic_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Review::from))
    }

    async fn list_reviews(&self, comic_id: ComicId) -> StoreResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE comic_id = $1 ORDER BY created_at DESC"
        ))
        .bind(*comic_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    // ==================== Reading ====================

    async fn upsert_progress(&self, progress: &ReadingProgress) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reading_progress (user_id, comic_id, chapter_id, current_page, total_pages, last_read_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, chapter_id) DO UPDATE SET
                current_page = $4, total_pages = $5, last_read_at = $6
            "#,
        )
        .bind(progress.user_id.as_str())
        .bind(*progress.comic_id.as_uuid())
        .bind(*progress.chapter_id.as_uuid())
        .bind(progress.current_page)
        .bind(progress.total_pages)
        .bind(progress.last_read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_progress(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
    ) -> StoreResult<Option<ReadingProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(&format!(
            r#"
            SELECT {PROGRESS_COLUMNS} FROM reading_progress
            WHERE user_id = $1 AND comic_id = $2
            ORDER BY last_read_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id.as_str())
        .bind(*comic_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ReadingProgress::from))
    }

    async fn recent_progress(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<ReadingProgress>> {
        let rows = sqlx::query_as::<_, ProgressRow>(&format!(
            r#"
            SELECT {PROGRESS_COLUMNS} FROM reading_progress
            WHERE user_id = $1
            ORDER BY last_read_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ReadingProgress::from).collect())
    }

    async fn touch_history(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reading_history (user_id, comic_id, last_read_at) VALUES ($1, $2, $3)
            ON CONFLICT (user_id, comic_id) DO UPDATE SET last_read_at = $3
            "#,
        )
        .bind(user_id.as_str())
        .bind(*comic_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_history(&self, user_id: &UserId, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT user_id, comic_id, last_read_at FROM reading_history
            WHERE user_id = $1
            ORDER BY last_read_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    // ==================== Notifications ====================

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, read, link, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*notification.id.as_uuid())
        .bind(notification.user_id.as_str())
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(&notification.link)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_notification(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Notification::try_from).transpose()
    }

    async fn list_notifications(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE user_id = $1
            ORDER BY seq DESC
            LIMIT $2
            "#
        ))
        .bind(user_id.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        try_collect(rows)
    }

    async fn unread_notifications(&self, user_id: &UserId) -> StoreResult<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
                .bind(user_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    async fn mark_notification_read(&self, id: NotificationId) -> StoreResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        expect_affected(result, "notification", id)
    }

    async fn mark_all_notifications_read(&self, user_id: &UserId) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
                .bind(user_id.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    // ==================== Reserved usernames ====================

    async fn is_reserved(&self, username: &str) -> StoreResult<bool> {
        let found: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM reserved_usernames WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(found.0)
    }

    async fn list_reserved(&self) -> StoreResult<Vec<ReservedUsername>> {
        let rows = sqlx::query_as::<_, ReservedUsernameRow>(
            "SELECT id, username, created_at, created_by FROM reserved_usernames ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ReservedUsername::from).collect())
    }

    async fn insert_reserved(&self, reserved: &ReservedUsername) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reserved_usernames (id, username, created_at, created_by)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(*reserved.id.as_uuid())
        .bind(&reserved.username)
        .bind(reserved.created_at)
        .bind(reserved.created_by.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            on_unique_violation(e, || StoreError::AlreadyReserved(reserved.username.clone()))
        })?;
        Ok(())
    }

    async fn delete_reserved(&self, id: ReservedUsernameId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM reserved_usernames WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        expect_affected(result, "reserved username", id)
    }
}
