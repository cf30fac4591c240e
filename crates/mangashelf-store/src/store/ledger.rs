//! Ledger port over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;

use mangashelf_core::{
    AnalyticsDelta, AnalyticsRecord, BanId, BanRecord, ChapterId, ChapterPurchase, ComicId,
    Purchase, Transaction, TransactionId, TransactionKind, UserId, Wallet, normalize_username,
};

use super::{lock_user, on_unique_violation, Store};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    try_collect, AnalyticsRow, BanRow, ChapterPurchaseRow, PurchaseRow, TransactionRow, WalletRow,
};
use crate::ports::{Ledger, LedgerEntry, PurchaseItem, PurchaseOrder, Receipt};
use crate::rules;

const WALLET_COLUMNS: &str = "user_id, username, coins, updated_at";
const BAN_COLUMNS: &str =
    "id, user_id, kind, reason, banned_by, banned_at, expires_at, is_active";
const ANALYTICS_COLUMNS: &str =
    "comic_id, views, purchases, favorites, average_rating, revenue, last_updated";

async fn wallet_for_update(
    conn: &mut PgConnection,
    user_id: &UserId,
) -> StoreResult<Option<Wallet>> {
    let row = sqlx::query_as::<_, WalletRow>(&format!(
        "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(Wallet::from))
}

async fn set_balance(
    conn: &mut PgConnection,
    user_id: &UserId,
    coins: i64,
    now: DateTime<Utc>,
) -> StoreResult<Wallet> {
    let row = sqlx::query_as::<_, WalletRow>(&format!(
        "UPDATE wallets SET coins = $2, updated_at = $3 WHERE user_id = $1 RETURNING {WALLET_COLUMNS}"
    ))
    .bind(user_id.as_str())
    .bind(coins)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

/// Appends one immutable ledger row with a signed amount.
async fn append_transaction(
    conn: &mut PgConnection,
    user_id: &UserId,
    kind: TransactionKind,
    amount: i64,
    description: &str,
    now: DateTime<Utc>,
) -> StoreResult<Transaction> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        INSERT INTO transactions (id, user_id, kind, amount, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, kind, amount, description, created_at
        "#,
    )
    .bind(*TransactionId::new().as_uuid())
    .bind(user_id.as_str())
    .bind(kind.as_str())
    .bind(amount)
    .bind(description)
    .bind(now)
    .fetch_one(conn)
    .await?;
    row.try_into()
}

async fn upsert_analytics(
    conn: &mut PgConnection,
    comic_id: ComicId,
    delta: &AnalyticsDelta,
    now: DateTime<Utc>,
) -> StoreResult<AnalyticsRecord> {
    let row = sqlx::query_as::<_, AnalyticsRow>(&format!(
        r#"
        INSERT INTO analytics (comic_id, views, purchases, favorites, average_rating, revenue, last_updated)
        VALUES ($1, $2, $3, GREATEST($4, 0), 0, $5, $6)
        ON CONFLICT (comic_id) DO UPDATE SET
            views = analytics.views + $2,
            purchases = analytics.purchases + $3,
            favorites = GREATEST(analytics.favorites + $4, 0),
            revenue = analytics.revenue + $5,
            last_updated = $6
        RETURNING {ANALYTICS_COLUMNS}
        "#
    ))
    .bind(*comic_id.as_uuid())
    .bind(delta.views)
    .bind(delta.purchases)
    .bind(delta.favorites)
    .bind(delta.revenue)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

async fn exists(conn: &mut PgConnection, sql: &str, user_id: &UserId, id: uuid::Uuid) -> StoreResult<bool> {
    let found: (bool,) = sqlx::query_as(sql)
        .bind(user_id.as_str())
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(found.0)
}

const OWNS_COMIC: &str =
    "SELECT EXISTS (SELECT 1 FROM purchases WHERE user_id = $1 AND comic_id = $2)";
const OWNS_CHAPTER: &str =
    "SELECT EXISTS (SELECT 1 FROM chapter_purchases WHERE user_id = $1 AND chapter_id = $2)";

#[async_trait]
impl Ledger for Store {
    // ==================== Wallets ====================

    async fn get_wallet(&self, user_id: &UserId) -> StoreResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Wallet::from))
    }

    async fn find_wallet_by_username(&self, username: &str) -> StoreResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Wallet::from))
    }

    async fn get_or_create_wallet(
        &self,
        user_id: &UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Wallet> {
        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, username, coins, updated_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_str())
        .bind(username)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| on_unique_violation(e, || StoreError::UsernameTaken(username.to_string())))?;

        self.get_wallet(user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("wallet", user_id))
    }

    async fn set_username(
        &self,
        user_id: &UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Wallet> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let shadowed: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM wallets WHERE lower(btrim(user_id)) = $1 AND user_id <> $2 LIMIT 1",
        )
        .bind(username)
        .bind(user_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if shadowed.is_some() {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }

        let row = sqlx::query_as::<_, WalletRow>(&format!(
            r#"
            INSERT INTO wallets (user_id, username, coins, updated_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (user_id) DO UPDATE SET username = $2, updated_at = $3
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(user_id.as_str())
        .bind(username)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| on_unique_violation(e, || StoreError::UsernameTaken(username.to_string())))?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn credit(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> StoreResult<Wallet> {
        rules::validate_amount(entry.amount)?;
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, &entry.user_id).await?;

        let default_name = normalize_username(entry.user_id.as_str());
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            r#"
            INSERT INTO wallets (user_id, username, coins, updated_at)
            VALUES ($1, $4, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET coins = wallets.coins + $2, updated_at = $3
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(entry.user_id.as_str())
        .bind(entry.amount)
        .bind(now)
        .bind(&default_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| on_unique_violation(e, || StoreError::UsernameTaken(default_name.clone())))?;

        append_transaction(
            &mut tx,
            &entry.user_id,
            entry.kind,
            entry.amount,
            &entry.description,
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn debit(&self, entry: &LedgerEntry, now: DateTime<Utc>) -> StoreResult<Wallet> {
        rules::validate_amount(entry.amount)?;
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, &entry.user_id).await?;

        let current = wallet_for_update(&mut tx, &entry.user_id).await?;
        let balance = rules::debit_balance(current.as_ref(), entry.amount)?;
        let wallet = set_balance(&mut tx, &entry.user_id, balance, now).await?;
        append_transaction(
            &mut tx,
            &entry.user_id,
            entry.kind,
            -entry.amount,
            &entry.description,
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, user_id, kind, amount, description, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY seq DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        try_collect(rows)
    }

    async fn transaction_total(&self, user_id: &UserId) -> StoreResult<i64> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM transactions WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(total.0)
    }

    // ==================== Entitlements ====================

    async fn has_purchase(&self, user_id: &UserId, comic_id: ComicId) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await?;
        exists(&mut conn, OWNS_COMIC, user_id, *comic_id.as_uuid()).await
    }

    async fn has_chapter_purchase(
        &self,
        user_id: &UserId,
        chapter_id: ChapterId,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await?;
        exists(&mut conn, OWNS_CHAPTER, user_id, *chapter_id.as_uuid()).await
    }

    async fn commit_purchase(
        &self,
        order: &PurchaseOrder,
        now: DateTime<Utc>,
    ) -> StoreResult<Receipt> {
        rules::validate_price(order.price)?;
        let user_id = &order.user_id;
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        match order.item {
            PurchaseItem::Comic(comic_id) => {
                if exists(&mut tx, OWNS_COMIC, user_id, *comic_id.as_uuid()).await? {
                    return Err(StoreError::AlreadyPurchased);
                }
            }
            PurchaseItem::Chapter {
                chapter_id,
                comic_id,
            } => {
                if exists(&mut tx, OWNS_CHAPTER, user_id, *chapter_id.as_uuid()).await? {
                    return Err(StoreError::AlreadyPurchased);
                }
                if exists(&mut tx, OWNS_COMIC, user_id, *comic_id.as_uuid()).await? {
                    return Err(StoreError::AlreadyOwnsComic);
                }
            }
        }

        let current = wallet_for_update(&mut tx, user_id).await?;
        let mut balance = current.as_ref().map_or(0, |w| w.coins);
        let mut transaction = None;
        if order.price > 0 {
            balance = rules::debit_balance(current.as_ref(), order.price)?;
            set_balance(&mut tx, user_id, balance, now).await?;
            transaction = Some(
                append_transaction(
                    &mut tx,
                    user_id,
                    TransactionKind::Purchase,
                    -order.price,
                    &order.description,
                    now,
                )
                .await?,
            );
        }

        upsert_analytics(
            &mut tx,
            order.item.comic_id(),
            &AnalyticsDelta::purchase(order.price),
            now,
        )
        .await?;

        let inserted = match order.item {
            PurchaseItem::Comic(comic_id) => {
                sqlx::query(
                    "INSERT INTO purchases (user_id, comic_id, purchased_at) VALUES ($1, $2, $3)",
                )
                .bind(user_id.as_str())
                .bind(*comic_id.as_uuid())
                .bind(now)
                .execute(&mut *tx)
                .await
            }
            PurchaseItem::Chapter { chapter_id, .. } => {
                sqlx::query(
                    "INSERT INTO chapter_purchases (user_id, chapter_id, purchased_at) VALUES ($1, $2, $3)",
                )
                .bind(user_id.as_str())
                .bind(*chapter_id.as_uuid())
                .bind(now)
                .execute(&mut *tx)
                .await
            }
        };
        inserted.map_err(|e| on_unique_violation(e, || StoreError::AlreadyPurchased))?;

        tx.commit().await?;
        Ok(Receipt {
            purchased_at: now,
            balance,
            transaction,
        })
    }

    async fn list_purchases(&self, user_id: &UserId) -> StoreResult<Vec<Purchase>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(
            r#"
            SELECT user_id, comic_id, purchased_at FROM purchases
            WHERE user_id = $1
            ORDER BY purchased_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Purchase::from).collect())
    }

    async fn list_chapter_purchases(&self, user_id: &UserId) -> StoreResult<Vec<ChapterPurchase>> {
        let rows = sqlx::query_as::<_, ChapterPurchaseRow>(
            r#"
            SELECT user_id, chapter_id, purchased_at FROM chapter_purchases
            WHERE user_id = $1
            ORDER BY purchased_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChapterPurchase::from).collect())
    }

    // ==================== Admins ====================

    async fn is_admin(&self, user_id: &UserId) -> StoreResult<bool> {
        let found: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM admins WHERE user_id = $1)")
                .bind(user_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(found.0)
    }

    async fn add_admin(&self, user_id: &UserId, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO admins (user_id, created_at) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Bans ====================

    async fn active_ban(&self, user_id: &UserId) -> StoreResult<Option<BanRecord>> {
        let row = sqlx::query_as::<_, BanRow>(&format!(
            "SELECT {BAN_COLUMNS} FROM bans WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(BanRecord::try_from).transpose()
    }

    async fn insert_ban(&self, record: &BanRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, &record.user_id).await?;

        let existing: Option<(uuid::Uuid,)> =
            sqlx::query_as("SELECT id FROM bans WHERE user_id = $1 AND is_active FOR UPDATE")
                .bind(record.user_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(StoreError::AlreadyBanned(record.user_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO bans (id, user_id, kind, reason, banned_by, banned_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*record.id.as_uuid())
        .bind(record.user_id.as_str())
        .bind(record.kind.as_str())
        .bind(&record.reason)
        .bind(record.banned_by.as_str())
        .bind(record.banned_at)
        .bind(record.expires_at)
        .bind(record.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| on_unique_violation(e, || StoreError::AlreadyBanned(record.user_id.to_string())))?;

        tx.commit().await?;
        Ok(())
    }

    async fn deactivate_ban(&self, ban_id: BanId) -> StoreResult<BanRecord> {
        sqlx::query_as::<_, BanRow>(&format!(
            "UPDATE bans SET is_active = FALSE WHERE id = $1 RETURNING {BAN_COLUMNS}"
        ))
        .bind(*ban_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("ban", ban_id))?
        .try_into()
    }

    async fn list_bans(&self, include_inactive: bool) -> StoreResult<Vec<BanRecord>> {
        let rows = sqlx::query_as::<_, BanRow>(&format!(
            "SELECT {BAN_COLUMNS} FROM bans WHERE $1 OR is_active ORDER BY banned_at DESC"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        try_collect(rows)
    }

    // ==================== Analytics ====================

    async fn get_analytics(&self, comic_id: ComicId) -> StoreResult<Option<AnalyticsRecord>> {
        let row = sqlx::query_as::<_, AnalyticsRow>(&format!(
            "SELECT {ANALYTICS_COLUMNS} FROM analytics WHERE comic_id = $1"
        ))
        .bind(*comic_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AnalyticsRecord::from))
    }

    async fn apply_analytics(
        &self,
        comic_id: ComicId,
        delta: &AnalyticsDelta,
        now: DateTime<Utc>,
    ) -> StoreResult<AnalyticsRecord> {
        let mut conn = self.pool.acquire().await?;
        upsert_analytics(&mut conn, comic_id, delta, now).await
    }

    async fn set_average_rating(
        &self,
        comic_id: ComicId,
        average: f64,
        now: DateTime<Utc>,
    ) -> StoreResult<AnalyticsRecord> {
        let row = sqlx::query_as::<_, AnalyticsRow>(&format!(
            r#"
            INSERT INTO analytics (comic_id, average_rating, last_updated)
            VALUES ($1, $2, $3)
            ON CONFLICT (comic_id) DO UPDATE SET average_rating = $2, last_updated = $3
            RETURNING {ANALYTICS_COLUMNS}
            "#
        ))
        .bind(*comic_id.as_uuid())
        .bind(average)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_analytics(&self) -> StoreResult<Vec<AnalyticsRecord>> {
        let rows = sqlx::query_as::<_, AnalyticsRow>(&format!(
            "SELECT {ANALYTICS_COLUMNS} FROM analytics"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AnalyticsRecord::from).collect())
    }
}

#[cfg(all(test, feature = "integration-tests"))]
mod integration_tests {
    use super::*;
    use crate::store::StoreConfig;
    use tokio::task::JoinSet;

    async fn setup_test_store() -> Store {
        let config = StoreConfig::from_env().unwrap_or_default();
        Store::connect(config)
            .await
            .expect("Failed to connect to database")
    }

    fn random_user(prefix: &str) -> UserId {
        UserId::new(format!("{prefix}-{:016x}", rand::random::<u64>()))
    }

    fn entry(user_id: &UserId, kind: TransactionKind, amount: i64) -> LedgerEntry {
        LedgerEntry {
            user_id: user_id.clone(),
            kind,
            amount,
            description: "integration".to_string(),
        }
    }

    #[tokio::test]
    async fn test_credit_and_debit_reconcile() {
        let store = setup_test_store().await;
        let user = random_user("ledger");
        let now = Utc::now();

        store
            .credit(&entry(&user, TransactionKind::Topup, 100), now)
            .await
            .expect("credit failed");
        store
            .debit(&entry(&user, TransactionKind::Purchase, 40), now)
            .await
            .expect("debit failed");
        let err = store
            .debit(&entry(&user, TransactionKind::Purchase, 61), now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { available: 60, .. }));

        let wallet = store.get_wallet(&user).await.unwrap().unwrap();
        assert_eq!(wallet.coins, 60);
        assert_eq!(store.transaction_total(&user).await.unwrap(), 60);
        assert_eq!(store.list_transactions(&user, 50).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_purchase_succeeds_once() {
        let store = setup_test_store().await;
        let user = random_user("race");
        let comic_id = ComicId::new();
        store
            .credit(&entry(&user, TransactionKind::Topup, 30), Utc::now())
            .await
            .unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let store = store.clone();
            let order = PurchaseOrder {
                user_id: user.clone(),
                item: PurchaseItem::Comic(comic_id),
                price: 30,
                description: "race".to_string(),
            };
            tasks.spawn(async move { store.commit_purchase(&order, Utc::now()).await });
        }

        let mut successes = 0;
        while let Some(result) = tasks.join_next().await {
            match result.expect("Task panicked") {
                Ok(_) => successes += 1,
                Err(StoreError::AlreadyPurchased) | Err(StoreError::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.get_wallet(&user).await.unwrap().unwrap().coins, 0);
        assert_eq!(store.transaction_total(&user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_double_ban_rejected() {
        let store = setup_test_store().await;
        let user = random_user("banned");
        let now = Utc::now();
        let record = BanRecord {
            id: BanId::new(),
            user_id: user.clone(),
            kind: mangashelf_core::BanKind::Ban,
            reason: "spam".to_string(),
            banned_by: UserId::from("admin"),
            banned_at: now,
            expires_at: None,
            is_active: true,
        };
        store.insert_ban(&record).await.unwrap();

        let again = BanRecord {
            id: BanId::new(),
            ..record.clone()
        };
        assert!(matches!(
            store.insert_ban(&again).await,
            Err(StoreError::AlreadyBanned(_))
        ));

        let lifted = store.deactivate_ban(record.id).await.unwrap();
        assert!(!lifted.is_active);
        assert!(store.active_ban(&user).await.unwrap().is_none());
    }
}
