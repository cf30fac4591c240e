//! Core ledger types for the mangashelf storefront.
//!
//! This module defines the identifiers and the records owned by the coin
//! ledger:
//!
//! - Wallets hold a non-negative coin balance and a case-folded username
//! - Transactions are the append-only audit trail of balance changes
//! - Purchases and chapter purchases are permanent entitlements
//! - Ban records gate access; suspensions expire lazily at read time
//! - Analytics records are denormalized per-comic counters
//!
//! Timestamps serialize as epoch milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Declares a UUID-backed identifier newtype.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random id using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a comic in the catalog.
    ComicId
);
uuid_id!(
    /// Unique identifier for a chapter of a comic.
    ChapterId
);
uuid_id!(
    /// Unique identifier for a page image within a chapter.
    PageId
);
uuid_id!(
    /// Unique identifier for a ledger transaction row.
    TransactionId
);
uuid_id!(
    /// Unique identifier for a ban or suspension record.
    BanId
);
uuid_id!(
    /// Unique identifier for a review.
    ReviewId
);
uuid_id!(
    /// Unique identifier for a notification.
    NotificationId
);
uuid_id!(
    /// Unique identifier for a purchasable coin package.
    CoinPackageId
);
uuid_id!(
    /// Unique identifier for a featured placement slot.
    FeaturedId
);
uuid_id!(
    /// Unique identifier for a reserved username entry.
    ReservedUsernameId
);

/// Identity of a user as resolved by the external identity provider.
///
/// The ledger never mints user ids; it only consumes the opaque string the
/// identity collaborator hands over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Wraps an identity-provider user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Usernames
// ============================================================================

/// Minimum length of an explicitly chosen username.
pub const USERNAME_MIN_LEN: usize = 5;

/// Maximum length of an explicitly chosen username.
pub const USERNAME_MAX_LEN: usize = 32;

/// Case-folds a username or identifier for lookup and storage.
#[must_use]
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Returns true if an already normalized username is acceptable as an
/// explicit choice: 5-32 characters of `[a-z0-9_]`.
#[must_use]
pub fn is_valid_username(normalized: &str) -> bool {
    (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&normalized.len())
        && normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// ============================================================================
// Wallets and Transactions
// ============================================================================

/// A user's coin wallet.
///
/// Created lazily on first top-up, purchase attempt or username change and
/// never deleted. `coins` is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    /// Case-folded, unique across wallets.
    pub username: String,
    pub coins: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// A fresh empty wallet.
    #[must_use]
    pub fn empty(user_id: UserId, username: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username,
            coins: 0,
            updated_at: now,
        }
    }
}

/// Kind of balance change recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Coins credited by an administrator.
    Topup,
    /// Coins spent on a comic or chapter.
    Purchase,
    /// Coins returned by an administrator.
    Refund,
}

impl TransactionKind {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Topup => "topup",
            Self::Purchase => "purchase",
            Self::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topup" => Ok(Self::Topup),
            "purchase" => Ok(Self::Purchase),
            "refund" => Ok(Self::Refund),
            other => Err(UnknownVariant::new("transaction kind", other)),
        }
    }
}

/// One immutable row of the ledger.
///
/// `amount` is signed: positive credits, negative debits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Full-comic entitlement. At most one per (user, comic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub user_id: UserId,
    pub comic_id: ComicId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub purchased_at: DateTime<Utc>,
}

/// Single-chapter entitlement. At most one per (user, chapter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPurchase {
    pub user_id: UserId,
    pub chapter_id: ChapterId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub purchased_at: DateTime<Utc>,
}

// ============================================================================
// Bans and Suspensions
// ============================================================================

/// Sanction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanKind {
    /// Permanent access revocation.
    Ban,
    /// Time-boxed access revocation.
    Suspend,
}

impl BanKind {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ban => "ban",
            Self::Suspend => "suspend",
        }
    }
}

impl fmt::Display for BanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BanKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ban" => Ok(Self::Ban),
            "suspend" => Ok(Self::Suspend),
            other => Err(UnknownVariant::new("ban kind", other)),
        }
    }
}

/// A ban or suspension.
///
/// `is_active` is a historical flag flipped only by an explicit unban. Whether
/// the record is currently in force is always derived with [`BanRecord::in_force_at`]:
/// an active suspension whose `expires_at` has passed no longer bans the user,
/// even though `is_active` stays true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub id: BanId,
    pub user_id: UserId,
    pub kind: BanKind,
    pub reason: String,
    pub banned_by: UserId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub banned_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl BanRecord {
    /// Whether this record restricts the user at `now`.
    #[must_use]
    pub fn in_force_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match (self.kind, self.expires_at) {
            (BanKind::Suspend, Some(expires_at)) => expires_at >= now,
            _ => true,
        }
    }
}

/// Derived answer of the ban gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanStatus {
    pub is_banned: bool,
    #[serde(rename = "type")]
    pub kind: Option<BanKind>,
    pub reason: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BanStatus {
    /// Status of an unrestricted user.
    #[must_use]
    pub const fn clear() -> Self {
        Self {
            is_banned: false,
            kind: None,
            reason: None,
            expires_at: None,
        }
    }

    /// Derives the status from the user's active record, if any.
    #[must_use]
    pub fn derive(active: Option<&BanRecord>, now: DateTime<Utc>) -> Self {
        match active {
            Some(record) if record.in_force_at(now) => Self {
                is_banned: true,
                kind: Some(record.kind),
                reason: Some(record.reason.clone()),
                expires_at: record.expires_at,
            },
            _ => Self::clear(),
        }
    }
}

// ============================================================================
// Analytics
// ============================================================================

/// Denormalized per-comic counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub comic_id: ComicId,
    pub views: i64,
    pub purchases: i64,
    pub favorites: i64,
    pub average_rating: f64,
    pub revenue: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl AnalyticsRecord {
    /// An all-zero record for a comic.
    #[must_use]
    pub fn zero(comic_id: ComicId, now: DateTime<Utc>) -> Self {
        Self {
            comic_id,
            views: 0,
            purchases: 0,
            favorites: 0,
            average_rating: 0.0,
            revenue: 0,
            last_updated: now,
        }
    }

    /// Applies a counter delta. `favorites` never drops below zero.
    pub fn apply(&mut self, delta: &AnalyticsDelta, now: DateTime<Utc>) {
        self.views += delta.views;
        self.purchases += delta.purchases;
        self.favorites = (self.favorites + delta.favorites).max(0);
        self.revenue += delta.revenue;
        self.last_updated = now;
    }
}

/// Increment applied to an [`AnalyticsRecord`] by a single upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsDelta {
    pub views: i64,
    pub purchases: i64,
    pub favorites: i64,
    pub revenue: i64,
}

impl AnalyticsDelta {
    /// One page view.
    #[must_use]
    pub const fn view() -> Self {
        Self {
            views: 1,
            purchases: 0,
            favorites: 0,
            revenue: 0,
        }
    }

    /// One purchase bringing in `revenue` coins.
    #[must_use]
    pub const fn purchase(revenue: i64) -> Self {
        Self {
            views: 0,
            purchases: 1,
            favorites: 0,
            revenue,
        }
    }

    /// Favorite count change (+1 favorite, -1 unfavorite).
    #[must_use]
    pub const fn favorites(delta: i64) -> Self {
        Self {
            views: 0,
            purchases: 0,
            favorites: delta,
            revenue: 0,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A stored enum string did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn suspension(expires_at: DateTime<Utc>) -> BanRecord {
        BanRecord {
            id: BanId::new(),
            user_id: UserId::from("reader"),
            kind: BanKind::Suspend,
            reason: "spam".to_string(),
            banned_by: UserId::from("admin"),
            banned_at: t0(),
            expires_at: Some(expires_at),
            is_active: true,
        }
    }

    #[test]
    fn comic_id_parse() {
        let id = ComicId::new();
        let parsed: ComicId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ChapterId::from_uuid(Uuid::nil());
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"00000000-0000-0000-0000-000000000000\""
        );
        assert_eq!(serde_json::to_string(&UserId::from("u1")).unwrap(), "\"u1\"");
    }

    #[test]
    fn username_normalization() {
        assert_eq!(normalize_username("  MangaFan_01 "), "mangafan_01");
        assert!(is_valid_username("mangafan_01"));
        assert!(!is_valid_username("abcd"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username("UPPERCASE"));
        assert!(!is_valid_username(&"x".repeat(USERNAME_MAX_LEN + 1)));
    }

    #[test]
    fn transaction_kind_strings() {
        for kind in [
            TransactionKind::Topup,
            TransactionKind::Purchase,
            TransactionKind::Refund,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("gift".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn permanent_ban_is_always_in_force() {
        let mut record = suspension(t0());
        record.kind = BanKind::Ban;
        record.expires_at = None;
        assert!(record.in_force_at(t0() + Duration::days(3650)));
    }

    #[test]
    fn suspension_expires_lazily() {
        let record = suspension(t0() + Duration::days(1));
        assert!(record.in_force_at(t0()));
        assert!(!record.in_force_at(t0() + Duration::days(2)));
        // The historical flag is untouched by expiry.
        assert!(record.is_active);
    }

    #[test]
    fn ban_status_derivation() {
        let record = suspension(t0() + Duration::days(1));

        let status = BanStatus::derive(Some(&record), t0());
        assert!(status.is_banned);
        assert_eq!(status.kind, Some(BanKind::Suspend));
        assert_eq!(status.reason.as_deref(), Some("spam"));

        let later = BanStatus::derive(Some(&record), t0() + Duration::days(2));
        assert_eq!(later, BanStatus::clear());

        assert_eq!(BanStatus::derive(None, t0()), BanStatus::clear());
    }

    #[test]
    fn ban_status_serializes_type_and_millis() {
        let record = suspension(t0() + Duration::days(1));
        let json = serde_json::to_value(BanStatus::derive(Some(&record), t0())).unwrap();
        assert_eq!(json["type"], "suspend");
        assert_eq!(
            json["expires_at"],
            (t0() + Duration::days(1)).timestamp_millis()
        );
    }

    #[test]
    fn analytics_favorites_floor_at_zero() {
        let mut record = AnalyticsRecord::zero(ComicId::new(), t0());
        record.apply(&AnalyticsDelta::favorites(-1), t0());
        assert_eq!(record.favorites, 0);

        record.apply(&AnalyticsDelta::purchase(30), t0());
        record.apply(&AnalyticsDelta::view(), t0());
        assert_eq!(record.purchases, 1);
        assert_eq!(record.revenue, 30);
        assert_eq!(record.views, 1);
    }
}
