//! Reader engagement records: favorites, reviews, reading progress,
//! notifications and reserved usernames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{
    ChapterId, ComicId, NotificationId, ReservedUsernameId, ReviewId, UnknownVariant, UserId,
};

/// Lowest accepted star rating.
pub const MIN_RATING: i16 = 1;

/// Highest accepted star rating.
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: UserId,
    pub comic_id: ComicId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// A star rating with comment. One per (user, comic); resubmitting edits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub comic_id: ComicId,
    pub rating: i16,
    pub comment: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Mean rating over a comic's reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
}

impl RatingSummary {
    /// Averages the given ratings; an empty set averages to 0.
    #[must_use]
    pub fn from_ratings(ratings: impl IntoIterator<Item = i16>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0usize), |(sum, count), r| (sum + i64::from(r), count + 1));
        let average = if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        };
        Self { average, count }
    }
}

/// Where a reader stopped inside a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub user_id: UserId,
    pub comic_id: ComicId,
    pub chapter_id: ChapterId,
    pub current_page: i32,
    pub total_pages: i32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_read_at: DateTime<Utc>,
}

/// Last time a reader opened a comic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user_id: UserId,
    pub comic_id: ComicId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_read_at: DateTime<Utc>,
}

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewChapter,
    LowBalance,
    Purchase,
    Follow,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewChapter => "new_chapter",
            Self::LowBalance => "low_balance",
            Self::Purchase => "purchase",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_chapter" => Ok(Self::NewChapter),
            "low_balance" => Ok(Self::LowBalance),
            "purchase" => Ok(Self::Purchase),
            "follow" => Ok(Self::Follow),
            other => Err(UnknownVariant::new("notification kind", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Content of a notification about to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
}

impl NewNotification {
    #[must_use]
    pub fn into_notification(self, id: NotificationId, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            read: false,
            link: self.link,
            created_at: now,
        }
    }
}

/// A username administrators have withheld from self-service selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedUsername {
    pub id: ReservedUsernameId,
    /// Case-folded.
    pub username: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_summary() {
        let empty = RatingSummary::from_ratings(Vec::new());
        assert_eq!(empty.count, 0);
        assert_eq!(empty.average, 0.0);

        let summary = RatingSummary::from_ratings([5, 4, 3]);
        assert_eq!(summary.count, 3);
        assert!((summary.average - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn notification_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::LowBalance).unwrap(),
            "\"low_balance\""
        );
        assert_eq!(
            "new_chapter".parse::<NotificationKind>().unwrap(),
            NotificationKind::NewChapter
        );
    }
}
