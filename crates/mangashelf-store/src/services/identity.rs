//! Identifier resolution and the admin guard.

use mangashelf_core::{normalize_username, UserId, Wallet};

use super::Ctx;
use crate::error::{StoreError, StoreResult};

/// Canonical user behind an admin-supplied identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub user_id: UserId,
    /// `None` when the identifier matched no wallet and was taken as a user id.
    pub wallet: Option<Wallet>,
}

/// Maps a username or user id to a user id.
///
/// The username lookup uses the case-folded identifier; the user id lookup
/// uses it verbatim. An identifier matching neither is taken as a user id.
#[derive(Clone)]
pub struct IdentifierResolver {
    ctx: Ctx,
}

impl IdentifierResolver {
    pub(crate) fn new(ctx: Ctx) -> Self {
        Self { ctx }
    }

    pub async fn resolve(&self, identifier: &str) -> StoreResult<Resolved> {
        let identifier = identifier.trim();

        let folded = normalize_username(identifier);
        if let Some(wallet) = self.ctx.backend.find_wallet_by_username(&folded).await? {
            return Ok(Resolved {
                user_id: wallet.user_id.clone(),
                wallet: Some(wallet),
            });
        }

        let user_id = UserId::from(identifier);
        let wallet = self.ctx.backend.get_wallet(&user_id).await?;
        Ok(Resolved { user_id, wallet })
    }
}

/// Proof that the holder passed the admin check.
///
/// Only [`AdminGuard::authorize`] constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCapability {
    admin: UserId,
}

impl AdminCapability {
    pub fn admin(&self) -> &UserId {
        &self.admin
    }
}

#[derive(Clone)]
pub struct AdminGuard {
    ctx: Ctx,
}

impl AdminGuard {
    pub(crate) fn new(ctx: Ctx) -> Self {
        Self { ctx }
    }

    pub async fn authorize(&self, user_id: &UserId) -> StoreResult<AdminCapability> {
        if !self.ctx.backend.is_admin(user_id).await? {
            tracing::warn!(user_id = %user_id, "Admin authorization denied");
            return Err(StoreError::Unauthorized(user_id.to_string()));
        }
        Ok(AdminCapability {
            admin: user_id.clone(),
        })
    }

    pub async fn is_admin(&self, user_id: &UserId) -> StoreResult<bool> {
        self.ctx.backend.is_admin(user_id).await
    }

    /// Grants admin rights. Used at startup for the configured bootstrap admins.
    pub async fn add_admin(&self, user_id: &UserId) -> StoreResult<()> {
        self.ctx.backend.add_admin(user_id, self.ctx.now()).await?;
        tracing::info!(user_id = %user_id, "Admin added");
        Ok(())
    }
}
