//! mangashelf-core: domain types for the mangashelf storefront.
//!
//! This crate provides:
//! - Ledger types (wallets, transactions, purchases, bans, analytics)
//! - Catalog records (comics, chapters, pages, featured slots, coin packages)
//! - Engagement records (favorites, reviews, reading progress, notifications)
//! - The [`TimeSource`] port used to stamp records
//!
//! It performs no I/O.

pub mod catalog;
pub mod clock;
pub mod engagement;
pub mod types;

pub use catalog::{
    Chapter, ChapterPatch, CoinPackage, CoinPackagePatch, Comic, ComicDraft, FeaturedSlot, Page,
};
pub use clock::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use engagement::{
    Favorite, HistoryEntry, NewNotification, Notification, NotificationKind, RatingSummary,
    ReadingProgress, ReservedUsername, Review, MAX_RATING, MIN_RATING,
};
pub use types::{
    is_valid_username, normalize_username, AnalyticsDelta, AnalyticsRecord, BanId, BanKind,
    BanRecord, BanStatus, ChapterId, ChapterPurchase, CoinPackageId, ComicId, FeaturedId,
    NotificationId, PageId, Purchase, ReservedUsernameId, ReviewId, Transaction, TransactionId,
    TransactionKind, UnknownVariant, UserId, Wallet, USERNAME_MAX_LEN, USERNAME_MIN_LEN,
};
