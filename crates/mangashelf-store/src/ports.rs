//! Storage ports.
//!
//! The service layer talks to storage only through these traits. Two
//! implementations exist: [`crate::Store`] over PostgreSQL and
//! [`crate::MemoryStore`] over in-process tables.
//!
//! # Atomicity
//!
//! Every method is one isolated unit. Methods that check then write
//! ([`Ledger::credit`], [`Ledger::debit`], [`Ledger::commit_purchase`],
//! [`Ledger::insert_ban`], [`Ledger::set_username`]) perform the check and
//! the write under a per-user mutual-exclusion boundary and either apply
//! every effect or none.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mangashelf_core::{
    AnalyticsDelta, AnalyticsRecord, BanId, BanRecord, Chapter, ChapterId, ChapterPurchase,
    CoinPackage, CoinPackageId, Comic, ComicId, Favorite, FeaturedId, FeaturedSlot,
    HistoryEntry, Notification, NotificationId, Page, PageId, Purchase, ReadingProgress,
    ReservedUsername, ReservedUsernameId, Review, Transaction, TransactionKind, UserId, Wallet,
};

use crate::error::StoreResult;

/// One balance change to apply together with its transaction row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub kind: TransactionKind,
    /// Coins moved, always positive. The sign of the written transaction
    /// follows the direction of the change.
    pub amount: i64,
    pub description: String,
}

/// What a purchase grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseItem {
    Comic(ComicId),
    /// A single chapter; `comic_id` is its parent.
    Chapter {
        chapter_id: ChapterId,
        comic_id: ComicId,
    },
}

impl PurchaseItem {
    /// Comic whose analytics record the purchase counts against.
    #[must_use]
    pub const fn comic_id(&self) -> ComicId {
        match self {
            Self::Comic(comic_id) => *comic_id,
            Self::Chapter { comic_id, .. } => *comic_id,
        }
    }
}

/// A priced purchase ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    pub user_id: UserId,
    pub item: PurchaseItem,
    pub price: i64,
    pub description: String,
}

/// Outcome of a committed purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub purchased_at: DateTime<Utc>,
    /// Balance after the purchase; 0 when a free item was taken without a wallet.
    pub balance: i64,
    /// Ledger row of the debit; `None` for free items.
    pub transaction: Option<Transaction>,
}

/// Wallets, the transaction log, entitlements, admins, bans and analytics.
#[async_trait]
pub trait Ledger: Send + Sync {
    // ==================== Wallets ====================

    async fn get_wallet(&self, user_id: &UserId) -> StoreResult<Option<Wallet>>;

    /// Exact match on the stored (case-folded) username.
    async fn find_wallet_by_username(&self, username: &str) -> StoreResult<Option<Wallet>>;

    /// Returns the wallet unchanged if it exists, otherwise creates an empty
    /// one named `username`.
    async fn get_or_create_wallet(
        &self,
        user_id: &UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Wallet>;

    /// Fails with `UsernameTaken` if another wallet holds `username`.
    /// Creates the wallet if missing.
    async fn set_username(
        &self,
        user_id: &UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Wallet>;

    /// Adds coins and appends a positive transaction. Creates the wallet,
    /// named after the user id, if missing.
    async fn credit(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> StoreResult<Wallet>;

    /// Removes coins and appends a negative transaction. Fails with
    /// `InsufficientFunds` before any write if the wallet is missing or short.
    async fn debit(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> StoreResult<Wallet>;

    /// Newest first.
    async fn list_transactions(&self, user_id: &UserId, limit: usize)
        -> StoreResult<Vec<Transaction>>;

    /// Sum of every transaction amount of the user.
    async fn transaction_total(&self, user_id: &UserId) -> StoreResult<i64>;

    // ==================== Entitlements ====================

    async fn has_purchase(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool>;

    async fn has_chapter_purchase(&self, user_id: &UserId, chapter_id: ChapterId)
        -> StoreResult<bool>;

    /// Atomically: rejects duplicates (`AlreadyPurchased`) and chapters of an
    /// owned comic (`AlreadyOwnsComic`), debits a positive price with its
    /// transaction, counts the purchase in the comic's analytics and inserts
    /// the entitlement.
    async fn commit_purchase(&self, order: &PurchaseOrder, now: DateTime<Utc>)
        -> StoreResult<Receipt>;

    /// Newest first.
    async fn list_purchases(&self, user_id: &UserId) -> StoreResult<Vec<Purchase>>;

    /// Newest first.
    async fn list_chapter_purchases(&self, user_id: &UserId) -> StoreResult<Vec<ChapterPurchase>>;

    // ==================== Admins ====================

    async fn is_admin(&self, user_id: &UserId) -> StoreResult<bool>;

    /// Idempotent.
    async fn add_admin(&self, user_id: &UserId, now: DateTime<Utc>) -> StoreResult<()>;

    // ==================== Bans ====================

    /// The user's record with `is_active` set, in force or not.
    async fn active_ban(&self, user_id: &UserId) -> StoreResult<Option<BanRecord>>;

    /// Fails with `AlreadyBanned` if the user has any active record, expired
    /// suspensions included. Only an explicit unban clears the slot.
    async fn insert_ban(&self, record: &BanRecord) -> StoreResult<()>;

    /// Flips `is_active` to false. Repeating it is harmless.
    async fn deactivate_ban(&self, ban_id: BanId) -> StoreResult<BanRecord>;

    /// Newest first.
    async fn list_bans(&self, include_inactive: bool) -> StoreResult<Vec<BanRecord>>;

    // ==================== Analytics ====================

    async fn get_analytics(&self, comic_id: ComicId) -> StoreResult<Option<AnalyticsRecord>>;

    /// Upserts the record, seeding it with zeros plus `delta`.
    async fn apply_analytics(
        &self,
        comic_id: ComicId,
        delta: &AnalyticsDelta,
        now: DateTime<Utc>,
    ) -> StoreResult<AnalyticsRecord>;

    async fn set_average_rating(
        &self,
        comic_id: ComicId,
        average: f64,
        now: DateTime<Utc>,
    ) -> StoreResult<AnalyticsRecord>;

    async fn list_analytics(&self) -> StoreResult<Vec<AnalyticsRecord>>;
}

/// Comics, chapters, pages, featured slots and coin packages.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_comic(&self, id: ComicId) -> StoreResult<Option<Comic>>;

    /// Newest first, optionally restricted to one category.
    async fn list_comics(&self, category: Option<&str>) -> StoreResult<Vec<Comic>>;

    /// Case-insensitive title substring match, newest first.
    async fn search_comics(&self, query: &str, category: Option<&str>) -> StoreResult<Vec<Comic>>;

    async fn insert_comic(&self, comic: &Comic) -> StoreResult<()>;

    async fn update_comic(&self, comic: &Comic) -> StoreResult<()>;

    /// Removes the comic with its chapters, pages and featured slots.
    async fn delete_comic(&self, id: ComicId) -> StoreResult<()>;

    async fn get_chapter(&self, id: ChapterId) -> StoreResult<Option<Chapter>>;

    /// Ordered by chapter number.
    async fn list_chapters(&self, comic_id: ComicId) -> StoreResult<Vec<Chapter>>;

    async fn insert_chapter(&self, chapter: &Chapter) -> StoreResult<()>;

    async fn update_chapter(&self, chapter: &Chapter) -> StoreResult<()>;

    /// Removes the chapter and its pages.
    async fn delete_chapter(&self, id: ChapterId) -> StoreResult<()>;

    /// Ordered by page number.
    async fn list_pages(&self, chapter_id: ChapterId) -> StoreResult<Vec<Page>>;

    async fn insert_page(&self, page: &Page) -> StoreResult<()>;

    async fn delete_page(&self, id: PageId) -> StoreResult<()>;

    /// Slots still flagged active, highest priority first.
    async fn list_featured(&self) -> StoreResult<Vec<FeaturedSlot>>;

    async fn insert_featured(&self, slot: &FeaturedSlot) -> StoreResult<()>;

    async fn deactivate_featured(&self, id: FeaturedId) -> StoreResult<()>;

    async fn get_coin_package(&self, id: CoinPackageId) -> StoreResult<Option<CoinPackage>>;

    /// Ordered by coin amount.
    async fn list_coin_packages(&self, include_inactive: bool) -> StoreResult<Vec<CoinPackage>>;

    async fn insert_coin_package(&self, package: &CoinPackage) -> StoreResult<()>;

    async fn update_coin_package(&self, package: &CoinPackage) -> StoreResult<()>;
}

/// Favorites, reviews, reading state, notifications and reserved usernames.
#[async_trait]
pub trait Engagement: Send + Sync {
    /// Adds or removes the favorite; returns whether it is now favorited.
    async fn toggle_favorite(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn is_favorited(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool>;

    /// Newest first.
    async fn list_favorites(&self, user_id: &UserId) -> StoreResult<Vec<Favorite>>;

    async fn favoriters(&self, comic_id: ComicId) -> StoreResult<Vec<UserId>>;

    async fn count_favorites(&self, comic_id: ComicId) -> StoreResult<i64>;

    /// Inserts or replaces the (user, comic) review. An existing review keeps
    /// its id and `created_at`.
    async fn upsert_review(&self, review: &Review) -> StoreResult<Review>;

    async fn get_review(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<Option<Review>>;

    /// Newest first.
    async fn list_reviews(&self, comic_id: ComicId) -> StoreResult<Vec<Review>>;

    /// Upsert per (user, chapter).
    async fn upsert_progress(&self, progress: &ReadingProgress) -> StoreResult<()>;

    /// Most recently read chapter of the comic.
    async fn latest_progress(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
    ) -> StoreResult<Option<ReadingProgress>>;

    /// Most recent first.
    async fn recent_progress(&self, user_id: &UserId, limit: usize)
        -> StoreResult<Vec<ReadingProgress>>;

    /// Upsert per (user, comic).
    async fn touch_history(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Most recent first.
    async fn recent_history(&self, user_id: &UserId, limit: usize) -> StoreResult<Vec<HistoryEntry>>;

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()>;

    async fn get_notification(&self, id: NotificationId) -> StoreResult<Option<Notification>>;

    /// Newest first.
    async fn list_notifications(&self, user_id: &UserId, limit: usize)
        -> StoreResult<Vec<Notification>>;

    async fn unread_notifications(&self, user_id: &UserId) -> StoreResult<i64>;

    async fn mark_notification_read(&self, id: NotificationId) -> StoreResult<()>;

    /// Returns how many notifications were marked.
    async fn mark_all_notifications_read(&self, user_id: &UserId) -> StoreResult<u64>;

    async fn is_reserved(&self, username: &str) -> StoreResult<bool>;

    /// Alphabetical.
    async fn list_reserved(&self) -> StoreResult<Vec<ReservedUsername>>;

    /// Fails with `AlreadyReserved` on duplicates.
    async fn insert_reserved(&self, reserved: &ReservedUsername) -> StoreResult<()>;

    async fn delete_reserved(&self, id: ReservedUsernameId) -> StoreResult<()>;
}

/// Everything the services need from a storage backend.
pub trait Backend: Ledger + Catalog + Engagement {}

impl<T: Ledger + Catalog + Engagement> Backend for T {}
