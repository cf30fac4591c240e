//! mangashelf-server: HTTP API for the mangashelf storefront
//!
//! This crate provides:
//! - REST endpoints for wallets, purchases, the catalog and reader engagement
//! - Admin endpoints for top-ups, bans, catalog management and analytics
//! - Bearer-token identity, with an opt-in `X-User-Id` header for development
//! - A Server-Sent Events stream of each user's notifications
//!
//! # Architecture
//!
//! Handlers are thin: they extract the caller and hand off to the service
//! layer in `mangashelf-store`, which owns every ledger rule. The server adds
//! request tracing, CORS, request IDs and JSON error responses.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mangashelf_server::{routes, AppState, ServerConfig};
//! use mangashelf_store::MemoryStore;
//!
//! let config = ServerConfig::from_env()?;
//! let state = AppState::new(Arc::new(MemoryStore::new()), config);
//! let app = routes::build_router(state);
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-exports for convenience
pub use config::{ConfigError, ServerConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use events::NotificationBroadcaster;
pub use extract::Identity;
pub use state::AppState;

// Re-export dependent crates
pub use mangashelf_core;
pub use mangashelf_store;
