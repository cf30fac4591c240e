//! mangashelf-store: coin ledger, catalog storage and services
//!
//! This crate provides:
//! - Storage ports ([`Ledger`], [`Catalog`], [`Engagement`])
//! - PostgreSQL storage via sqlx ([`Store`]) with embedded migrations
//! - An in-process backend ([`MemoryStore`]) for tests and local runs
//! - The service layer: wallets, purchases, entitlements, the ban gate,
//!   analytics, catalog management and reader engagement
//!
//! # Architecture
//!
//! Services never touch SQL. They resolve identities, check admin rights and
//! bans, then hand one atomic unit of work to a backend. Backends own the
//! per-user mutual exclusion that keeps balances and entitlements consistent
//! under concurrent requests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mangashelf_store::{NoopSink, ServiceConfig, Services, Store, StoreConfig};
//! use mangashelf_core::SystemTimeSource;
//!
//! let store = Store::connect(StoreConfig::from_env()?).await?;
//! let services = Services::new(
//!     Arc::new(store),
//!     Arc::new(SystemTimeSource),
//!     Arc::new(NoopSink),
//!     ServiceConfig::default(),
//! );
//!
//! let balance = services.wallets.get_balance(&user_id).await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod ports;
pub mod rules;
pub mod schema;
pub mod services;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use ports::{
    Backend, Catalog, Engagement, Ledger, LedgerEntry, PurchaseItem, PurchaseOrder, Receipt,
};
pub use services::{
    AdminCapability, AdminGuard, Analytics, BanGate, CatalogService, ContinueReading,
    Entitlements, Favorites, FeaturedComic, IdentifierResolver, NewChapter, NewCoinPackage,
    NoopSink, NotificationSink, Notifications, Purchases, Reading, RecentlyRead, Reconciliation,
    ReservedUsernames, Resolved, Reviews, ServiceConfig, Services, TransactionLog, Wallets,
    DEFAULT_LOW_BALANCE_THRESHOLD,
};
pub use store::{Store, StoreConfig};

// Re-export mangashelf-core for downstream crates
pub use mangashelf_core;
