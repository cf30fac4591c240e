//! Route definitions for the HTTP API.

pub mod admin;
pub mod chapters;
pub mod comics;
pub mod events;
pub mod health;
pub mod me;
pub mod storefront;
pub mod wallet;

use axum::Router;
use serde::Deserialize;

use crate::state::AppState;

/// `?limit=` on listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Build the complete router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(wallet::routes())
        .merge(comics::routes())
        .merge(chapters::routes())
        .merge(storefront::routes())
        .merge(me::routes())
        .merge(events::routes())
        .merge(admin::routes())
        .with_state(state)
}
