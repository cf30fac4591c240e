//! Wallet store and transaction log.

use mangashelf_core::{normalize_username, Transaction, TransactionKind, UserId, Wallet};
use serde::Serialize;

use super::identity::{AdminGuard, IdentifierResolver};
use super::{Ctx, DEFAULT_TRANSACTION_LIMIT};
use crate::error::{StoreError, StoreResult};
use crate::ports::LedgerEntry;
use crate::rules;

/// Balance checked against the sum of the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub balance: i64,
    pub ledger_total: i64,
    pub consistent: bool,
}

#[derive(Clone)]
pub struct Wallets {
    ctx: Ctx,
    admins: AdminGuard,
    resolver: IdentifierResolver,
}

impl Wallets {
    pub(crate) fn new(ctx: Ctx, admins: AdminGuard, resolver: IdentifierResolver) -> Self {
        Self {
            ctx,
            admins,
            resolver,
        }
    }

    /// 0 when the user has no wallet yet.
    pub async fn get_balance(&self, user_id: &UserId) -> StoreResult<i64> {
        Ok(self
            .ctx
            .backend
            .get_wallet(user_id)
            .await?
            .map_or(0, |wallet| wallet.coins))
    }

    /// Returns the existing wallet unchanged, or creates an empty one named
    /// `username` (case-folded), falling back to the folded user id.
    pub async fn get_or_create_wallet(
        &self,
        user_id: &UserId,
        username: Option<&str>,
    ) -> StoreResult<Wallet> {
        let username = username
            .map(normalize_username)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| normalize_username(user_id.as_str()));
        self.ctx
            .backend
            .get_or_create_wallet(user_id, &username, self.ctx.now())
            .await
    }

    pub async fn set_username(&self, user_id: &UserId, username: &str) -> StoreResult<Wallet> {
        let username = rules::canonical_username(username)?;
        if self.ctx.backend.is_reserved(&username).await? {
            return Err(StoreError::UsernameReserved(username));
        }
        let wallet = self
            .ctx
            .backend
            .set_username(user_id, &username, self.ctx.now())
            .await?;
        tracing::info!(user_id = %user_id, username = %wallet.username, "Username set");
        Ok(wallet)
    }

    pub async fn get_username(&self, user_id: &UserId) -> StoreResult<Option<String>> {
        Ok(self
            .ctx
            .backend
            .get_wallet(user_id)
            .await?
            .map(|wallet| wallet.username))
    }

    pub async fn find_by_username(&self, username: &str) -> StoreResult<Option<Wallet>> {
        self.ctx
            .backend
            .find_wallet_by_username(&normalize_username(username))
            .await
    }

    /// Admin credit to a username or user id.
    pub async fn topup(
        &self,
        admin: &UserId,
        identifier: &str,
        amount: i64,
        description: &str,
    ) -> StoreResult<Wallet> {
        self.admin_credit(admin, identifier, TransactionKind::Topup, amount, description)
            .await
    }

    /// Admin credit logged as a refund.
    pub async fn refund(
        &self,
        admin: &UserId,
        identifier: &str,
        amount: i64,
        description: &str,
    ) -> StoreResult<Wallet> {
        self.admin_credit(admin, identifier, TransactionKind::Refund, amount, description)
            .await
    }

    async fn admin_credit(
        &self,
        admin: &UserId,
        identifier: &str,
        kind: TransactionKind,
        amount: i64,
        description: &str,
    ) -> StoreResult<Wallet> {
        let capability = self.admins.authorize(admin).await?;
        rules::validate_amount(amount)?;
        let target = self.resolver.resolve(identifier).await?;

        let entry = LedgerEntry {
            user_id: target.user_id,
            kind,
            amount,
            description: description.to_string(),
        };
        let wallet = self.ctx.backend.credit(&entry, self.ctx.now()).await?;

        tracing::info!(
            admin = %capability.admin(),
            user_id = %wallet.user_id,
            kind = %kind,
            amount,
            balance = wallet.coins,
            "Wallet credited"
        );
        Ok(wallet)
    }

    /// Debits the wallet with a `purchase` transaction.
    pub async fn deduct_coins(
        &self,
        user_id: &UserId,
        amount: i64,
        description: &str,
    ) -> StoreResult<Wallet> {
        let entry = LedgerEntry {
            user_id: user_id.clone(),
            kind: TransactionKind::Purchase,
            amount,
            description: description.to_string(),
        };
        let wallet = self.ctx.backend.debit(&entry, self.ctx.now()).await?;
        tracing::info!(user_id = %user_id, amount, balance = wallet.coins, "Wallet debited");
        Ok(wallet)
    }

    pub async fn reconcile(&self, user_id: &UserId) -> StoreResult<Reconciliation> {
        let balance = self.get_balance(user_id).await?;
        let ledger_total = self.ctx.backend.transaction_total(user_id).await?;
        if balance != ledger_total {
            tracing::error!(user_id = %user_id, balance, ledger_total, "Ledger does not reconcile");
        }
        Ok(Reconciliation {
            balance,
            ledger_total,
            consistent: balance == ledger_total,
        })
    }
}

/// Read side of the append-only transaction log.
///
/// Rows are written by the ledger operations themselves, inside the same
/// unit as the balance change they record.
#[derive(Clone)]
pub struct TransactionLog {
    ctx: Ctx,
}

impl TransactionLog {
    pub(crate) fn new(ctx: Ctx) -> Self {
        Self { ctx }
    }

    /// Newest first; `limit` defaults to 50.
    pub async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Transaction>> {
        self.ctx
            .backend
            .list_transactions(user_id, limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT))
            .await
    }
}
