//! Catalog records: comics, chapters, pages, featured slots and coin packages.
//!
//! The ledger only reads the catalog (`price`, `title`, parent comic); the
//! catalog itself is managed by administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChapterId, CoinPackageId, ComicId, FeaturedId, PageId};

/// A comic or manga series offered in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comic {
    pub id: ComicId,
    pub title: String,
    pub description: String,
    pub cover_image: String,
    /// Full-comic price in coins; 0 means free.
    pub price: i64,
    pub author: String,
    pub genre: Vec<String>,
    /// Shelf such as "Manga", "Manhwa", "Marvel".
    pub category: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Comic {
    /// Whether reading the comic costs nothing.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}

/// Editable comic fields, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    pub price: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: Vec<String>,
    #[serde(default)]
    pub category: String,
}

impl ComicDraft {
    /// Materializes a new comic.
    #[must_use]
    pub fn into_comic(self, id: ComicId, now: DateTime<Utc>) -> Comic {
        Comic {
            id,
            title: self.title,
            description: self.description,
            cover_image: self.cover_image,
            price: self.price,
            author: self.author,
            genre: self.genre,
            category: self.category,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the editable fields of an existing comic.
    pub fn apply_to(self, comic: &mut Comic, now: DateTime<Utc>) {
        comic.title = self.title;
        comic.description = self.description;
        comic.cover_image = self.cover_image;
        comic.price = self.price;
        comic.author = self.author;
        comic.genre = self.genre;
        comic.category = self.category;
        comic.updated_at = now;
    }
}

/// A chapter belonging to a comic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub comic_id: ComicId,
    pub chapter_number: i32,
    pub title: String,
    /// Single-chapter price in coins; 0 means free.
    pub price: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Partial chapter update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPatch {
    pub chapter_number: Option<i32>,
    pub title: Option<String>,
    pub price: Option<i64>,
}

impl ChapterPatch {
    pub fn apply_to(self, chapter: &mut Chapter, now: DateTime<Utc>) {
        if let Some(number) = self.chapter_number {
            chapter.chapter_number = number;
        }
        if let Some(title) = self.title {
            chapter.title = title;
        }
        if let Some(price) = self.price {
            chapter.price = price;
        }
        chapter.updated_at = now;
    }
}

/// One page image of a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub chapter_id: ChapterId,
    pub page_number: i32,
    pub image_url: String,
}

/// Featured placement of a comic on the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedSlot {
    pub id: FeaturedId,
    pub comic_id: ComicId,
    /// Higher is more prominent.
    pub priority: i32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
}

impl FeaturedSlot {
    /// Whether the slot should be shown at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.start_date <= now && self.end_date.is_none_or(|end| end >= now)
    }
}

/// A coin bundle shown on the coins page. Top-ups themselves stay manual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPackage {
    pub id: CoinPackageId,
    pub name: String,
    pub coins: i64,
    /// Display price in the smallest currency unit.
    pub price: i64,
    pub bonus: i64,
    pub popular: bool,
    pub active: bool,
}

/// Partial coin package update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinPackagePatch {
    pub name: Option<String>,
    pub coins: Option<i64>,
    pub price: Option<i64>,
    pub bonus: Option<i64>,
    pub popular: Option<bool>,
    pub active: Option<bool>,
}

impl CoinPackagePatch {
    pub fn apply_to(self, package: &mut CoinPackage) {
        if let Some(name) = self.name {
            package.name = name;
        }
        if let Some(coins) = self.coins {
            package.coins = coins;
        }
        if let Some(price) = self.price {
            package.price = price;
        }
        if let Some(bonus) = self.bonus {
            package.bonus = bonus;
        }
        if let Some(popular) = self.popular {
            package.popular = popular;
        }
        if let Some(active) = self.active {
            package.active = active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn slot(end_date: Option<DateTime<Utc>>) -> FeaturedSlot {
        FeaturedSlot {
            id: FeaturedId::new(),
            comic_id: ComicId::new(),
            priority: 1,
            start_date: t0(),
            end_date,
            active: true,
        }
    }

    #[test]
    fn featured_window() {
        let open = slot(None);
        assert!(!open.is_live(t0() - Duration::seconds(1)));
        assert!(open.is_live(t0() + Duration::days(400)));

        let bounded = slot(Some(t0() + Duration::days(7)));
        assert!(bounded.is_live(t0() + Duration::days(7)));
        assert!(!bounded.is_live(t0() + Duration::days(8)));

        let mut removed = slot(None);
        removed.active = false;
        assert!(!removed.is_live(t0()));
    }

    #[test]
    fn chapter_patch_keeps_unset_fields() {
        let mut chapter = Chapter {
            id: ChapterId::new(),
            comic_id: ComicId::new(),
            chapter_number: 3,
            title: "The Duel".to_string(),
            price: 5,
            created_at: t0(),
            updated_at: t0(),
        };
        ChapterPatch {
            price: Some(0),
            ..ChapterPatch::default()
        }
        .apply_to(&mut chapter, t0() + Duration::hours(1));

        assert_eq!(chapter.price, 0);
        assert_eq!(chapter.chapter_number, 3);
        assert_eq!(chapter.title, "The Duel");
        assert_eq!(chapter.updated_at, t0() + Duration::hours(1));
    }

    #[test]
    fn comic_draft_defaults() {
        let draft: ComicDraft =
            serde_json::from_str(r#"{"title": "Blue Lock", "price": 30}"#).unwrap();
        let comic = draft.into_comic(ComicId::new(), t0());
        assert_eq!(comic.title, "Blue Lock");
        assert!(comic.genre.is_empty());
        assert!(!comic.is_free());
    }
}
