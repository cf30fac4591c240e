//! Database models for the storage layer.
//!
//! These types map directly to database rows and are used for
//! sqlx queries. They are separate from the domain types in
//! mangashelf-core; each row converts into its domain record, and rows
//! with enum columns convert fallibly.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use mangashelf_core::{
    AnalyticsRecord, BanId, BanRecord, Chapter, ChapterId, ChapterPurchase, CoinPackage,
    CoinPackageId, Comic, ComicId, Favorite, FeaturedId, FeaturedSlot, HistoryEntry,
    Notification, NotificationId, Page, PageId, Purchase, ReadingProgress, ReservedUsername,
    ReservedUsernameId, Review, ReviewId, Transaction, TransactionId, UserId, Wallet,
};

use crate::error::{StoreError, StoreResult};

// ==================== Ledger ====================

/// Database row for the `wallets` table.
#[derive(Debug, Clone, FromRow)]
pub struct WalletRow {
    pub user_id: String,
    pub username: String,
    pub coins: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            username: row.username,
            coins: row.coins,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for the `transactions` table.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> StoreResult<Self> {
        Ok(Self {
            id: TransactionId::from_uuid(row.id),
            user_id: UserId(row.user_id),
            kind: row.kind.parse()?,
            amount: row.amount,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Database row for the `purchases` table.
#[derive(Debug, Clone, FromRow)]
pub struct PurchaseRow {
    pub user_id: String,
    pub comic_id: Uuid,
    pub purchased_at: DateTime<Utc>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            comic_id: ComicId::from_uuid(row.comic_id),
            purchased_at: row.purchased_at,
        }
    }
}

/// Database row for the `chapter_purchases` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChapterPurchaseRow {
    pub user_id: String,
    pub chapter_id: Uuid,
    pub purchased_at: DateTime<Utc>,
}

impl From<ChapterPurchaseRow> for ChapterPurchase {
    fn from(row: ChapterPurchaseRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            chapter_id: ChapterId::from_uuid(row.chapter_id),
            purchased_at: row.purchased_at,
        }
    }
}

/// Database row for the `bans` table.
#[derive(Debug, Clone, FromRow)]
pub struct BanRow {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub reason: String,
    pub banned_by: String,
    pub banned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl TryFrom<BanRow> for BanRecord {
    type Error = StoreError;

    fn try_from(row: BanRow) -> StoreResult<Self> {
        Ok(Self {
            id: BanId::from_uuid(row.id),
            user_id: UserId(row.user_id),
            kind: row.kind.parse()?,
            reason: row.reason,
            banned_by: UserId(row.banned_by),
            banned_at: row.banned_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        })
    }
}

/// Database row for the `analytics` table.
#[derive(Debug, Clone, FromRow)]
pub struct AnalyticsRow {
    pub comic_id: Uuid,
    pub views: i64,
    pub purchases: i64,
    pub favorites: i64,
    pub average_rating: f64,
    pub revenue: i64,
    pub last_updated: DateTime<Utc>,
}

impl From<AnalyticsRow> for AnalyticsRecord {
    fn from(row: AnalyticsRow) -> Self {
        Self {
            comic_id: ComicId::from_uuid(row.comic_id),
            views: row.views,
            purchases: row.purchases,
            favorites: row.favorites,
            average_rating: row.average_rating,
            revenue: row.revenue,
            last_updated: row.last_updated,
        }
    }
}

// ==================== Catalog ====================

/// Database row for the `comics` table.
#[derive(Debug, Clone, FromRow)]
pub struct ComicRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover_image: String,
    pub price: i64,
    pub author: String,
    pub genre: Vec<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ComicRow> for Comic {
    fn from(row: ComicRow) -> Self {
        Self {
            id: ComicId::from_uuid(row.id),
            title: row.title,
            description: row.description,
            cover_image: row.cover_image,
            price: row.price,
            author: row.author,
            genre: row.genre,
            category: row.category,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for the `chapters` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChapterRow {
    pub id: Uuid,
    pub comic_id: Uuid,
    pub chapter_number: i32,
    pub title: String,
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChapterRow> for Chapter {
    fn from(row: ChapterRow) -> Self {
        Self {
            id: ChapterId::from_uuid(row.id),
            comic_id: ComicId::from_uuid(row.comic_id),
            chapter_number: row.chapter_number,
            title: row.title,
            price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for the `pages` table.
#[derive(Debug, Clone, FromRow)]
pub struct PageRow {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub page_number: i32,
    pub image_url: String,
}

impl From<PageRow> for Page {
    fn from(row: PageRow) -> Self {
        Self {
            id: PageId::from_uuid(row.id),
            chapter_id: ChapterId::from_uuid(row.chapter_id),
            page_number: row.page_number,
            image_url: row.image_url,
        }
    }
}

/// Database row for the `featured` table.
#[derive(Debug, Clone, FromRow)]
pub struct FeaturedRow {
    pub id: Uuid,
    pub comic_id: Uuid,
    pub priority: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
}

impl From<FeaturedRow> for FeaturedSlot {
    fn from(row: FeaturedRow) -> Self {
        Self {
            id: FeaturedId::from_uuid(row.id),
            comic_id: ComicId::from_uuid(row.comic_id),
            priority: row.priority,
            start_date: row.start_date,
            end_date: row.end_date,
            active: row.active,
        }
    }
}

/// Database row for the `coin_packages` table.
#[derive(Debug, Clone, FromRow)]
pub struct CoinPackageRow {
    pub id: Uuid,
    pub name: String,
    pub coins: i64,
    pub price: i64,
    pub bonus: i64,
    pub popular: bool,
    pub active: bool,
}

impl From<CoinPackageRow> for CoinPackage {
    fn from(row: CoinPackageRow) -> Self {
        Self {
            id: CoinPackageId::from_uuid(row.id),
            name: row.name,
            coins: row.coins,
            price: row.price,
            bonus: row.bonus,
            popular: row.popular,
            active: row.active,
        }
    }
}

// ==================== Engagement ====================

/// Database row for the `favorites` table.
#[derive(Debug, Clone, FromRow)]
pub struct FavoriteRow {
    pub user_id: String,
    pub comic_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<FavoriteRow> for Favorite {
    fn from(row: FavoriteRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            comic_id: ComicId::from_uuid(row.comic_id),
            created_at: row.created_at,
        }
    }
}

/// Database row for the `reviews` table.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub user_id: String,
    pub comic_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::from_uuid(row.id),
            user_id: UserId(row.user_id),
            comic_id: ComicId::from_uuid(row.comic_id),
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for the `reading_progress` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProgressRow {
    pub user_id: String,
    pub comic_id: Uuid,
    pub chapter_id: Uuid,
    pub current_page: i32,
    pub total_pages: i32,
    pub last_read_at: DateTime<Utc>,
}

impl From<ProgressRow> for ReadingProgress {
    fn from(row: ProgressRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            comic_id: ComicId::from_uuid(row.comic_id),
            chapter_id: ChapterId::from_uuid(row.chapter_id),
            current_page: row.current_page,
            total_pages: row.total_pages,
            last_read_at: row.last_read_at,
        }
    }
}

/// Database row for the `reading_history` table.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub user_id: String,
    pub comic_id: Uuid,
    pub last_read_at: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            user_id: UserId(row.user_id),
            comic_id: ComicId::from_uuid(row.comic_id),
            last_read_at: row.last_read_at,
        }
    }
}

/// Database row for the `notifications` table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> StoreResult<Self> {
        Ok(Self {
            id: NotificationId::from_uuid(row.id),
            user_id: UserId(row.user_id),
            kind: row.kind.parse()?,
            title: row.title,
            message: row.message,
            read: row.read,
            link: row.link,
            created_at: row.created_at,
        })
    }
}

/// Database row for the `reserved_usernames` table.
#[derive(Debug, Clone, FromRow)]
pub struct ReservedUsernameRow {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl From<ReservedUsernameRow> for ReservedUsername {
    fn from(row: ReservedUsernameRow) -> Self {
        Self {
            id: ReservedUsernameId::from_uuid(row.id),
            username: row.username,
            created_at: row.created_at,
            created_by: UserId(row.created_by),
        }
    }
}

/// Converts a batch of rows that may hold unknown enum values.
pub(crate) fn try_collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
