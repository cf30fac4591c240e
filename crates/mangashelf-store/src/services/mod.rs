//! Service layer.
//!
//! Services orchestrate the storage ports: they resolve identities, apply the
//! admin guard and ban gate, stamp times from the [`TimeSource`] and hand
//! atomic units of work to the backend. They hold no state of their own and
//! are cheap to clone.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mangashelf_core::SystemTimeSource;
//! use mangashelf_store::{MemoryStore, NoopSink, ServiceConfig, Services};
//!
//! let services = Services::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(SystemTimeSource),
//!     Arc::new(NoopSink),
//!     ServiceConfig::default(),
//! );
//! let receipt = services.purchases.purchase_comic(&user_id, comic_id).await?;
//! ```

mod analytics;
mod bans;
mod catalog;
mod engagement;
mod entitlements;
mod identity;
mod notifications;
mod purchases;
mod wallets;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mangashelf_core::TimeSource;

use crate::ports::Backend;

pub use analytics::Analytics;
pub use bans::BanGate;
pub use catalog::{CatalogService, FeaturedComic, NewChapter, NewCoinPackage};
pub use engagement::{ContinueReading, Favorites, Reading, RecentlyRead, ReservedUsernames, Reviews};
pub use entitlements::Entitlements;
pub use identity::{AdminCapability, AdminGuard, IdentifierResolver, Resolved};
pub use notifications::{NoopSink, NotificationSink, Notifications};
pub use purchases::Purchases;
pub use wallets::{Reconciliation, TransactionLog, Wallets};

/// Default balance below which a purchase triggers a low-balance notification.
pub const DEFAULT_LOW_BALANCE_THRESHOLD: i64 = 10;

/// Default page size of a user's transaction history.
pub const DEFAULT_TRANSACTION_LIMIT: usize = 50;

/// Tunables of the service layer.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub low_balance_threshold: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            low_balance_threshold: DEFAULT_LOW_BALANCE_THRESHOLD,
        }
    }
}

/// Backend and clock shared by every service.
#[derive(Clone)]
pub(crate) struct Ctx {
    pub(crate) backend: Arc<dyn Backend>,
    clock: Arc<dyn TimeSource>,
}

impl Ctx {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Every service, wired to one backend.
#[derive(Clone)]
pub struct Services {
    pub admins: AdminGuard,
    pub resolver: IdentifierResolver,
    pub wallets: Wallets,
    pub transactions: TransactionLog,
    pub entitlements: Entitlements,
    pub purchases: Purchases,
    pub bans: BanGate,
    pub analytics: Analytics,
    pub catalog: CatalogService,
    pub favorites: Favorites,
    pub reviews: Reviews,
    pub reading: Reading,
    pub notifications: Notifications,
    pub reserved: ReservedUsernames,
}

impl Services {
    pub fn new(
        backend: Arc<dyn Backend>,
        clock: Arc<dyn TimeSource>,
        sink: Arc<dyn NotificationSink>,
        config: ServiceConfig,
    ) -> Self {
        let ctx = Ctx { backend, clock };

        let admins = AdminGuard::new(ctx.clone());
        let resolver = IdentifierResolver::new(ctx.clone());
        let notifications = Notifications::new(ctx.clone(), sink);
        let bans = BanGate::new(ctx.clone(), admins.clone(), resolver.clone());
        let entitlements = Entitlements::new(ctx.clone());
        let analytics = Analytics::new(ctx.clone(), admins.clone());
        let reserved = ReservedUsernames::new(ctx.clone(), admins.clone());

        Self {
            wallets: Wallets::new(ctx.clone(), admins.clone(), resolver.clone()),
            transactions: TransactionLog::new(ctx.clone()),
            purchases: Purchases::new(
                ctx.clone(),
                bans.clone(),
                notifications.clone(),
                config.low_balance_threshold,
            ),
            catalog: CatalogService::new(
                ctx.clone(),
                admins.clone(),
                bans.clone(),
                entitlements.clone(),
                notifications.clone(),
            ),
            favorites: Favorites::new(ctx.clone(), bans.clone(), analytics.clone()),
            reviews: Reviews::new(ctx.clone(), bans.clone(), analytics.clone()),
            reading: Reading::new(ctx, bans.clone()),
            admins,
            resolver,
            entitlements,
            bans,
            analytics,
            notifications,
            reserved,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
