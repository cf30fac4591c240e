//! Ban and suspension gate.
//!
//! Suspension expiry is lazy: [`BanGate::get_status`] derives the answer from
//! the active record and the current time, and never flips `is_active`. The
//! flag records that an admin has not lifted the sanction; only
//! [`BanGate::unban`] clears it.

use mangashelf_core::{BanId, BanKind, BanRecord, BanStatus, UserId};

use super::identity::{AdminGuard, IdentifierResolver};
use super::Ctx;
use crate::error::{StoreError, StoreResult};
use crate::rules;

#[derive(Clone)]
pub struct BanGate {
    ctx: Ctx,
    admins: AdminGuard,
    resolver: IdentifierResolver,
}

impl BanGate {
    pub(crate) fn new(ctx: Ctx, admins: AdminGuard, resolver: IdentifierResolver) -> Self {
        Self {
            ctx,
            admins,
            resolver,
        }
    }

    pub async fn get_status(&self, user_id: &UserId) -> StoreResult<BanStatus> {
        let active = self.ctx.backend.active_ban(user_id).await?;
        Ok(BanStatus::derive(active.as_ref(), self.ctx.now()))
    }

    /// Fails with `Banned` while the user is banned or suspended.
    pub async fn ensure_not_banned(&self, user_id: &UserId) -> StoreResult<()> {
        let status = self.get_status(user_id).await?;
        if status.is_banned {
            tracing::debug!(user_id = %user_id, "Rejected banned user");
            return Err(StoreError::Banned {
                reason: status.reason.unwrap_or_default(),
            });
        }
        Ok(())
    }

    pub async fn ban(&self, admin: &UserId, identifier: &str, reason: &str) -> StoreResult<BanRecord> {
        self.sanction(admin, identifier, reason, None).await
    }

    pub async fn suspend(
        &self,
        admin: &UserId,
        identifier: &str,
        reason: &str,
        days: i64,
    ) -> StoreResult<BanRecord> {
        self.sanction(admin, identifier, reason, Some(days)).await
    }

    async fn sanction(
        &self,
        admin: &UserId,
        identifier: &str,
        reason: &str,
        suspend_days: Option<i64>,
    ) -> StoreResult<BanRecord> {
        let capability = self.admins.authorize(admin).await?;
        let now = self.ctx.now();
        let (kind, expires_at) = match suspend_days {
            Some(days) => (BanKind::Suspend, Some(rules::suspension_expiry(now, days)?)),
            None => (BanKind::Ban, None),
        };
        let target = self.resolver.resolve(identifier).await?;

        let record = BanRecord {
            id: BanId::new(),
            user_id: target.user_id,
            kind,
            reason: reason.to_string(),
            banned_by: capability.admin().clone(),
            banned_at: now,
            expires_at,
            is_active: true,
        };
        self.ctx.backend.insert_ban(&record).await?;

        tracing::info!(
            admin = %record.banned_by,
            user_id = %record.user_id,
            kind = %record.kind,
            ban_id = %record.id,
            "User sanctioned"
        );
        Ok(record)
    }

    /// Deactivates the record. Unbanning twice is harmless.
    pub async fn unban(&self, admin: &UserId, ban_id: BanId) -> StoreResult<BanRecord> {
        let capability = self.admins.authorize(admin).await?;
        let record = self.ctx.backend.deactivate_ban(ban_id).await?;
        tracing::info!(
            admin = %capability.admin(),
            user_id = %record.user_id,
            ban_id = %ban_id,
            "User unbanned"
        );
        Ok(record)
    }

    /// Newest first.
    pub async fn list_bans(&self, admin: &UserId, include_inactive: bool) -> StoreResult<Vec<BanRecord>> {
        self.admins.authorize(admin).await?;
        self.ctx.backend.list_bans(include_inactive).await
    }
}
