//! In-process storage backend.
//!
//! All tables live behind a single async mutex, so every port method runs
//! serialized against every other one. Used by tests and by the server when
//! `STORE_BACKEND=memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use mangashelf_core::{
    AnalyticsDelta, AnalyticsRecord, BanId, BanRecord, Chapter, ChapterId, ChapterPurchase,
    CoinPackage, CoinPackageId, Comic, ComicId, Favorite, FeaturedId, FeaturedSlot,
    HistoryEntry, Notification, NotificationId, Page, PageId, Purchase, ReadingProgress,
    ReservedUsername, ReservedUsernameId, Review, Transaction, TransactionId, TransactionKind,
    UserId, Wallet, normalize_username,
};

use crate::error::{StoreError, StoreResult};
use crate::ports::{Catalog, Engagement, Ledger, LedgerEntry, PurchaseItem, PurchaseOrder, Receipt};
use crate::rules;

#[derive(Debug, Default)]
struct Tables {
    wallets: HashMap<UserId, Wallet>,
    transactions: Vec<Transaction>,
    purchases: Vec<Purchase>,
    chapter_purchases: Vec<ChapterPurchase>,
    admins: HashSet<UserId>,
    bans: Vec<BanRecord>,
    analytics: HashMap<ComicId, AnalyticsRecord>,

    comics: HashMap<ComicId, Comic>,
    chapters: HashMap<ChapterId, Chapter>,
    pages: HashMap<PageId, Page>,
    featured: Vec<FeaturedSlot>,
    coin_packages: HashMap<CoinPackageId, CoinPackage>,

    favorites: Vec<Favorite>,
    reviews: Vec<Review>,
    progress: Vec<ReadingProgress>,
    history: Vec<HistoryEntry>,
    notifications: Vec<Notification>,
    reserved: Vec<ReservedUsername>,
}

impl Tables {
    fn username_holder(&self, username: &str) -> Option<&UserId> {
        self.wallets
            .values()
            .find(|w| w.username == username)
            .map(|w| &w.user_id)
    }

    /// A username that folds to another wallet's user id would capture
    /// lookups meant for that user.
    fn shadows_other_user(&self, username: &str, user_id: &UserId) -> bool {
        self.wallets
            .keys()
            .any(|id| id != user_id && normalize_username(id.as_str()) == username)
    }

    fn wallet_or_create(&mut self, user_id: &UserId, username: &str, now: DateTime<Utc>) -> &mut Wallet {
        self.wallets
            .entry(user_id.clone())
            .or_insert_with(|| Wallet::empty(user_id.clone(), username.to_string(), now))
    }

    fn append_transaction(&mut self, entry: &LedgerEntry, amount: i64, now: DateTime<Utc>) -> Transaction {
        let transaction = Transaction {
            id: TransactionId::new(),
            user_id: entry.user_id.clone(),
            kind: entry.kind,
            amount,
            description: entry.description.clone(),
            created_at: now,
        };
        self.transactions.push(transaction.clone());
        transaction
    }

    fn owns_comic(&self, user_id: &UserId, comic_id: ComicId) -> bool {
        self.purchases
            .iter()
            .any(|p| &p.user_id == user_id && p.comic_id == comic_id)
    }

    fn owns_chapter(&self, user_id: &UserId, chapter_id: ChapterId) -> bool {
        self.chapter_purchases
            .iter()
            .any(|p| &p.user_id == user_id && p.chapter_id == chapter_id)
    }

    fn analytics_entry(&mut self, comic_id: ComicId, now: DateTime<Utc>) -> &mut AnalyticsRecord {
        self.analytics
            .entry(comic_id)
            .or_insert_with(|| AnalyticsRecord::zero(comic_id, now))
    }

    fn remove_chapter_pages(&mut self, chapter_id: ChapterId) {
        self.pages.retain(|_, page| page.chapter_id != chapter_id);
    }
}

/// Storage backend holding every table in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn get_wallet(&self, user_id: &UserId) -> StoreResult<Option<Wallet>> {
        Ok(self.tables.lock().await.wallets.get(user_id).cloned())
    }

    async fn find_wallet_by_username(&self, username: &str) -> StoreResult<Option<Wallet>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .wallets
            .values()
            .find(|w| w.username == username)
            .cloned())
    }

    async fn get_or_create_wallet(
        &self,
        user_id: &UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Wallet> {
        let mut tables = self.tables.lock().await;
        if let Some(wallet) = tables.wallets.get(user_id) {
            return Ok(wallet.clone());
        }
        if tables.username_holder(username).is_some() {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        Ok(tables.wallet_or_create(user_id, username, now).clone())
    }

    async fn set_username(
        &self,
        user_id: &UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Wallet> {
        let mut tables = self.tables.lock().await;
        if tables
            .username_holder(username)
            .is_some_and(|holder| holder != user_id)
            || tables.shadows_other_user(username, user_id)
        {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        let wallet = tables.wallet_or_create(user_id, username, now);
        wallet.username = username.to_string();
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    async fn credit(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> StoreResult<Wallet> {
        rules::validate_amount(entry.amount)?;
        let mut tables = self.tables.lock().await;
        let default_name = normalize_username(entry.user_id.as_str());
        if !tables.wallets.contains_key(&entry.user_id)
            && tables.username_holder(&default_name).is_some()
        {
            return Err(StoreError::UsernameTaken(default_name));
        }
        let wallet = tables.wallet_or_create(&entry.user_id, &default_name, now);
        wallet.coins += entry.amount;
        wallet.updated_at = now;
        let wallet = wallet.clone();
        tables.append_transaction(entry, entry.amount, now);
        Ok(wallet)
    }

    async fn debit(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> StoreResult<Wallet> {
        rules::validate_amount(entry.amount)?;
        let mut tables = self.tables.lock().await;
        let balance = rules::debit_balance(tables.wallets.get(&entry.user_id), entry.amount)?;
        let wallet = tables
            .wallets
            .get_mut(&entry.user_id)
            .ok_or_else(|| StoreError::not_found("wallet", &entry.user_id))?;
        wallet.coins = balance;
        wallet.updated_at = now;
        let wallet = wallet.clone();
        tables.append_transaction(entry, -entry.amount, now);
        Ok(wallet)
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<Transaction>> {
        let tables = self.tables.lock().await;
        // Insertion order breaks timestamp ties.
        Ok(tables
            .transactions
            .iter()
            .rev()
            .filter(|t| &t.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transaction_total(&self, user_id: &UserId) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| &t.user_id == user_id)
            .map(|t| t.amount)
            .sum())
    }

    async fn has_purchase(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        Ok(self.tables.lock().await.owns_comic(user_id, comic_id))
    }

    async fn has_chapter_purchase(
        &self,
        user_id: &UserId,
        chapter_id: ChapterId,
    ) -> StoreResult<bool> {
        Ok(self.tables.lock().await.owns_chapter(user_id, chapter_id))
    }

    async fn commit_purchase(
        &self,
        order: &PurchaseOrder,
        now: DateTime<Utc>,
    ) -> StoreResult<Receipt> {
        rules::validate_price(order.price)?;
        let mut tables = self.tables.lock().await;
        let user_id = &order.user_id;

        match order.item {
            PurchaseItem::Comic(comic_id) => {
                if tables.owns_comic(user_id, comic_id) {
                    return Err(StoreError::AlreadyPurchased);
                }
            }
            PurchaseItem::Chapter {
                chapter_id,
                comic_id,
            } => {
                if tables.owns_chapter(user_id, chapter_id) {
                    return Err(StoreError::AlreadyPurchased);
                }
                if tables.owns_comic(user_id, comic_id) {
                    return Err(StoreError::AlreadyOwnsComic);
                }
            }
        }

        let mut balance = tables.wallets.get(user_id).map_or(0, |w| w.coins);
        let mut transaction = None;
        if order.price > 0 {
            balance = rules::debit_balance(tables.wallets.get(user_id), order.price)?;
            if let Some(wallet) = tables.wallets.get_mut(user_id) {
                wallet.coins = balance;
                wallet.updated_at = now;
            }
            let entry = LedgerEntry {
                user_id: user_id.clone(),
                kind: TransactionKind::Purchase,
                amount: order.price,
                description: order.description.clone(),
            };
            transaction = Some(tables.append_transaction(&entry, -order.price, now));
        }

        tables
            .analytics_entry(order.item.comic_id(), now)
            .apply(&AnalyticsDelta::purchase(order.price), now);

        match order.item {
            PurchaseItem::Comic(comic_id) => tables.purchases.push(Purchase {
                user_id: user_id.clone(),
                comic_id,
                purchased_at: now,
            }),
            PurchaseItem::Chapter { chapter_id, .. } => {
                tables.chapter_purchases.push(ChapterPurchase {
                    user_id: user_id.clone(),
                    chapter_id,
                    purchased_at: now,
                })
            }
        }

        Ok(Receipt {
            purchased_at: now,
            balance,
            transaction,
        })
    }

    async fn list_purchases(&self, user_id: &UserId) -> StoreResult<Vec<Purchase>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .purchases
            .iter()
            .rev()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_chapter_purchases(&self, user_id: &UserId) -> StoreResult<Vec<ChapterPurchase>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .chapter_purchases
            .iter()
            .rev()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn is_admin(&self, user_id: &UserId) -> StoreResult<bool> {
        Ok(self.tables.lock().await.admins.contains(user_id))
    }

    async fn add_admin(&self, user_id: &UserId, _now: DateTime<Utc>) -> StoreResult<()> {
        self.tables.lock().await.admins.insert(user_id.clone());
        Ok(())
    }

    async fn active_ban(&self, user_id: &UserId) -> StoreResult<Option<BanRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bans
            .iter()
            .find(|b| &b.user_id == user_id && b.is_active)
            .cloned())
    }

    async fn insert_ban(&self, record: &BanRecord) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .bans
            .iter()
            .any(|b| b.user_id == record.user_id && b.is_active)
        {
            return Err(StoreError::AlreadyBanned(record.user_id.to_string()));
        }
        tables.bans.push(record.clone());
        Ok(())
    }

    async fn deactivate_ban(&self, ban_id: BanId) -> StoreResult<BanRecord> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .bans
            .iter_mut()
            .find(|b| b.id == ban_id)
            .ok_or_else(|| StoreError::not_found("ban", ban_id))?;
        record.is_active = false;
        Ok(record.clone())
    }

    async fn list_bans(&self, include_inactive: bool) -> StoreResult<Vec<BanRecord>> {
        let tables = self.tables.lock().await;
        let mut bans: Vec<BanRecord> = tables
            .bans
            .iter()
            .filter(|b| include_inactive || b.is_active)
            .cloned()
            .collect();
        newest_first(&mut bans, |b| b.banned_at);
        Ok(bans)
    }

    async fn get_analytics(&self, comic_id: ComicId) -> StoreResult<Option<AnalyticsRecord>> {
        Ok(self.tables.lock().await.analytics.get(&comic_id).cloned())
    }

    async fn apply_analytics(
        &self,
        comic_id: ComicId,
        delta: &AnalyticsDelta,
        now: DateTime<Utc>,
    ) -> StoreResult<AnalyticsRecord> {
        let mut tables = self.tables.lock().await;
        let record = tables.analytics_entry(comic_id, now);
        record.apply(delta, now);
        Ok(record.clone())
    }

    async fn set_average_rating(
        &self,
        comic_id: ComicId,
        average: f64,
        now: DateTime<Utc>,
    ) -> StoreResult<AnalyticsRecord> {
        let mut tables = self.tables.lock().await;
        let record = tables.analytics_entry(comic_id, now);
        record.average_rating = average;
        record.last_updated = now;
        Ok(record.clone())
    }

    async fn list_analytics(&self) -> StoreResult<Vec<AnalyticsRecord>> {
        Ok(self.tables.lock().await.analytics.values().cloned().collect())
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn get_comic(&self, id: ComicId) -> StoreResult<Option<Comic>> {
        Ok(self.tables.lock().await.comics.get(&id).cloned())
    }

    async fn list_comics(&self, category: Option<&str>) -> StoreResult<Vec<Comic>> {
        let tables = self.tables.lock().await;
        let mut comics: Vec<Comic> = tables
            .comics
            .values()
            .filter(|c| category.is_none_or(|cat| c.category == cat))
            .cloned()
            .collect();
        newest_first(&mut comics, |c| c.created_at);
        Ok(comics)
    }

    async fn search_comics(&self, query: &str, category: Option<&str>) -> StoreResult<Vec<Comic>> {
        let needle = query.to_lowercase();
        let mut comics = self.list_comics(category).await?;
        comics.retain(|c| c.title.to_lowercase().contains(&needle));
        Ok(comics)
    }

    async fn insert_comic(&self, comic: &Comic) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .comics
            .insert(comic.id, comic.clone());
        Ok(())
    }

    async fn update_comic(&self, comic: &Comic) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let slot = tables
            .comics
            .get_mut(&comic.id)
            .ok_or_else(|| StoreError::not_found("comic", comic.id))?;
        *slot = comic.clone();
        Ok(())
    }

    async fn delete_comic(&self, id: ComicId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables
            .comics
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("comic", id))?;
        let chapters: Vec<ChapterId> = tables
            .chapters
            .values()
            .filter(|c| c.comic_id == id)
            .map(|c| c.id)
            .collect();
        for chapter_id in chapters {
            tables.chapters.remove(&chapter_id);
            tables.remove_chapter_pages(chapter_id);
        }
        tables.featured.retain(|slot| slot.comic_id != id);
        Ok(())
    }

    async fn get_chapter(&self, id: ChapterId) -> StoreResult<Option<Chapter>> {
        Ok(self.tables.lock().await.chapters.get(&id).cloned())
    }

    async fn list_chapters(&self, comic_id: ComicId) -> StoreResult<Vec<Chapter>> {
        let tables = self.tables.lock().await;
        let mut chapters: Vec<Chapter> = tables
            .chapters
            .values()
            .filter(|c| c.comic_id == comic_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.chapter_number);
        Ok(chapters)
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.comics.contains_key(&chapter.comic_id) {
            return Err(StoreError::not_found("comic", chapter.comic_id));
        }
        tables.chapters.insert(chapter.id, chapter.clone());
        Ok(())
    }

    async fn update_chapter(&self, chapter: &Chapter) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let slot = tables
            .chapters
            .get_mut(&chapter.id)
            .ok_or_else(|| StoreError::not_found("chapter", chapter.id))?;
        *slot = chapter.clone();
        Ok(())
    }

    async fn delete_chapter(&self, id: ChapterId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables
            .chapters
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("chapter", id))?;
        tables.remove_chapter_pages(id);
        Ok(())
    }

    async fn list_pages(&self, chapter_id: ChapterId) -> StoreResult<Vec<Page>> {
        let tables = self.tables.lock().await;
        let mut pages: Vec<Page> = tables
            .pages
            .values()
            .filter(|p| p.chapter_id == chapter_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_number);
        Ok(pages)
    }

    async fn insert_page(&self, page: &Page) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.chapters.contains_key(&page.chapter_id) {
            return Err(StoreError::not_found("chapter", page.chapter_id));
        }
        tables.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn delete_page(&self, id: PageId) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .pages
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("page", id))
    }

    async fn list_featured(&self) -> StoreResult<Vec<FeaturedSlot>> {
        let tables = self.tables.lock().await;
        let mut slots: Vec<FeaturedSlot> =
            tables.featured.iter().filter(|s| s.active).cloned().collect();
        slots.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(slots)
    }

    async fn insert_featured(&self, slot: &FeaturedSlot) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.comics.contains_key(&slot.comic_id) {
            return Err(StoreError::not_found("comic", slot.comic_id));
        }
        tables.featured.push(slot.clone());
        Ok(())
    }

    async fn deactivate_featured(&self, id: FeaturedId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let slot = tables
            .featured
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::not_found("featured slot", id))?;
        slot.active = false;
        Ok(())
    }

    async fn get_coin_package(&self, id: CoinPackageId) -> StoreResult<Option<CoinPackage>> {
        Ok(self.tables.lock().await.coin_packages.get(&id).cloned())
    }

    async fn list_coin_packages(&self, include_inactive: bool) -> StoreResult<Vec<CoinPackage>> {
        let tables = self.tables.lock().await;
        let mut packages: Vec<CoinPackage> = tables
            .coin_packages
            .values()
            .filter(|p| include_inactive || p.active)
            .cloned()
            .collect();
        packages.sort_by_key(|p| p.coins);
        Ok(packages)
    }

    async fn insert_coin_package(&self, package: &CoinPackage) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .coin_packages
            .insert(package.id, package.clone());
        Ok(())
    }

    async fn update_coin_package(&self, package: &CoinPackage) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let slot = tables
            .coin_packages
            .get_mut(&package.id)
            .ok_or_else(|| StoreError::not_found("coin package", package.id))?;
        *slot = package.clone();
        Ok(())
    }
}

#[async_trait]
impl Engagement for MemoryStore {
    async fn toggle_favorite(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.favorites.len();
        tables
            .favorites
            .retain(|f| !(&f.user_id == user_id && f.comic_id == comic_id));
        if tables.favorites.len() < before {
            return Ok(false);
        }
        tables.favorites.push(Favorite {
            user_id: user_id.clone(),
            comic_id,
            created_at: now,
        });
        Ok(true)
    }

    async fn is_favorited(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .favorites
            .iter()
            .any(|f| &f.user_id == user_id && f.comic_id == comic_id))
    }

    async fn list_favorites(&self, user_id: &UserId) -> StoreResult<Vec<Favorite>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .favorites
            .iter()
            .rev()
            .filter(|f| &f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn favoriters(&self, comic_id: ComicId) -> StoreResult<Vec<UserId>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .favorites
            .iter()
            .filter(|f| f.comic_id == comic_id)
            .map(|f| f.user_id.clone())
            .collect())
    }

    async fn count_favorites(&self, comic_id: ComicId) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .favorites
            .iter()
            .filter(|f| f.comic_id == comic_id)
            .count() as i64)
    }

    async fn upsert_review(&self, review: &Review) -> StoreResult<Review> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .reviews
            .iter_mut()
            .find(|r| r.user_id == review.user_id && r.comic_id == review.comic_id)
        {
            existing.rating = review.rating;
            existing.comment = review.comment.clone();
            existing.updated_at = review.updated_at;
            return Ok(existing.clone());
        }
        tables.reviews.push(review.clone());
        Ok(review.clone())
    }

    async fn get_review(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<Option<Review>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .find(|r| &r.user_id == user_id && r.comic_id == comic_id)
            .cloned())
    }

    async fn list_reviews(&self, comic_id: ComicId) -> StoreResult<Vec<Review>> {
        let tables = self.tables.lock().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| r.comic_id == comic_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| r.created_at);
        Ok(reviews)
    }

    async fn upsert_progress(&self, progress: &ReadingProgress) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.progress.retain(|p| {
            !(p.user_id == progress.user_id && p.chapter_id == progress.chapter_id)
        });
        tables.progress.push(progress.clone());
        Ok(())
    }

    async fn latest_progress(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
    ) -> StoreResult<Option<ReadingProgress>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .progress
            .iter()
            .rev()
            .filter(|p| &p.user_id == user_id && p.comic_id == comic_id)
            .max_by_key(|p| p.last_read_at)
            .cloned())
    }

    async fn recent_progress(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<ReadingProgress>> {
        let tables = self.tables.lock().await;
        let mut progress: Vec<ReadingProgress> = tables
            .progress
            .iter()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut progress, |p| p.last_read_at);
        progress.truncate(limit);
        Ok(progress)
    }

    async fn touch_history(
        &self,
        user_id: &UserId,
        comic_id: ComicId,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        match tables
            .history
            .iter_mut()
            .find(|h| &h.user_id == user_id && h.comic_id == comic_id)
        {
            Some(entry) => entry.last_read_at = now,
            None => tables.history.push(HistoryEntry {
                user_id: user_id.clone(),
                comic_id,
                last_read_at: now,
            }),
        }
        Ok(())
    }

    async fn recent_history(&self, user_id: &UserId, limit: usize) -> StoreResult<Vec<HistoryEntry>> {
        let tables = self.tables.lock().await;
        let mut history: Vec<HistoryEntry> = tables
            .history
            .iter()
            .filter(|h| &h.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut history, |h| h.last_read_at);
        history.truncate(limit);
        Ok(history)
    }

    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn get_notification(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let tables = self.tables.lock().await;
        Ok(tables.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn list_notifications(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| &n.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn unread_notifications(&self, user_id: &UserId) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| &n.user_id == user_id && !n.read)
            .count() as i64)
    }

    async fn mark_notification_read(&self, id: NotificationId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::not_found("notification", id))?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: &UserId) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let mut marked = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| &n.user_id == user_id && !n.read)
        {
            notification.read = true;
            marked += 1;
        }
        Ok(marked)
    }

    async fn is_reserved(&self, username: &str) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.reserved.iter().any(|r| r.username == username))
    }

    async fn list_reserved(&self) -> StoreResult<Vec<ReservedUsername>> {
        let tables = self.tables.lock().await;
        let mut reserved = tables.reserved.clone();
        reserved.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(reserved)
    }

    async fn insert_reserved(&self, reserved: &ReservedUsername) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.reserved.iter().any(|r| r.username == reserved.username) {
            return Err(StoreError::AlreadyReserved(reserved.username.clone()));
        }
        tables.reserved.push(reserved.clone());
        Ok(())
    }

    async fn delete_reserved(&self, id: ReservedUsernameId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.reserved.len();
        tables.reserved.retain(|r| r.id != id);
        if tables.reserved.len() == before {
            return Err(StoreError::not_found("reserved username", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn topup(user: &str, amount: i64) -> LedgerEntry {
        LedgerEntry {
            user_id: UserId::from(user),
            kind: TransactionKind::Topup,
            amount,
            description: "manual top-up".to_string(),
        }
    }

    #[tokio::test]
    async fn credit_creates_wallet_named_after_user() {
        let store = MemoryStore::new();
        let wallet = store.credit(&topup("reader-1", 50), t0()).await.unwrap();
        assert_eq!(wallet.coins, 50);
        assert_eq!(wallet.username, "reader-1");
        assert_eq!(store.transaction_total(&wallet.user_id).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn debit_fails_before_any_write() {
        let store = MemoryStore::new();
        store.credit(&topup("reader-1", 10), t0()).await.unwrap();

        let err = store.debit(&topup("reader-1", 11), t0()).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));

        let user = UserId::from("reader-1");
        assert_eq!(store.get_wallet(&user).await.unwrap().unwrap().coins, 10);
        assert_eq!(store.list_transactions(&user, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn username_uniqueness() {
        let store = MemoryStore::new();
        let alice = UserId::from("u-alice");
        let bob = UserId::from("u-bob");
        store.set_username(&alice, "alice", t0()).await.unwrap();

        // Re-setting one's own name is fine.
        store.set_username(&alice, "alice", t0()).await.unwrap();
        let err = store.set_username(&bob, "alice", t0()).await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(_)));
    }

    #[tokio::test]
    async fn delete_chapter_cascades_pages() {
        let store = MemoryStore::new();
        let comic = mangashelf_core::ComicDraft {
            title: "Frieren".to_string(),
            description: String::new(),
            cover_image: String::new(),
            price: 0,
            author: String::new(),
            genre: vec![],
            category: "Manga".to_string(),
        }
        .into_comic(ComicId::new(), t0());
        store.insert_comic(&comic).await.unwrap();

        let chapter = Chapter {
            id: ChapterId::new(),
            comic_id: comic.id,
            chapter_number: 1,
            title: "Journey's End".to_string(),
            price: 0,
            created_at: t0(),
            updated_at: t0(),
        };
        store.insert_chapter(&chapter).await.unwrap();
        for n in 1..=3 {
            store
                .insert_page(&Page {
                    id: PageId::new(),
                    chapter_id: chapter.id,
                    page_number: n,
                    image_url: format!("https://img.example/{n}.webp"),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.list_pages(chapter.id).await.unwrap().len(), 3);

        store.delete_chapter(chapter.id).await.unwrap();
        assert!(store.list_pages(chapter.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_favorite_flips() {
        let store = MemoryStore::new();
        let user = UserId::from("reader");
        let comic = ComicId::new();
        assert!(store.toggle_favorite(&user, comic, t0()).await.unwrap());
        assert_eq!(store.count_favorites(comic).await.unwrap(), 1);
        assert!(!store.toggle_favorite(&user, comic, t0()).await.unwrap());
        assert_eq!(store.count_favorites(comic).await.unwrap(), 0);
    }
}
