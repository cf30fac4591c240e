//! Public storefront listings.
//!
//! - GET /api/featured - Live featured comics, highest priority first
//! - GET /api/coin-packages - Active coin packages

use axum::{extract::State, routing::get, Json, Router};
use mangashelf_core::CoinPackage;
use mangashelf_store::FeaturedComic;

use crate::error::ApiResult;
use crate::state::AppState;

async fn featured(State(state): State<AppState>) -> ApiResult<Json<Vec<FeaturedComic>>> {
    Ok(Json(state.services().catalog.list_featured().await?))
}

async fn coin_packages(State(state): State<AppState>) -> ApiResult<Json<Vec<CoinPackage>>> {
    Ok(Json(state.services().catalog.list_coin_packages().await?))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/featured", get(featured))
        .route("/api/coin-packages", get(coin_packages))
}
