//! Comic browsing, access, purchase and per-comic engagement.
//!
//! - GET /api/comics - List or search (`?category=`, `?q=`)
//! - GET /api/comics/{id} - One comic
//! - GET /api/comics/{id}/chapters - Chapters by number
//! - GET /api/comics/{id}/access - Whether the caller may read it
//! - POST /api/comics/{id}/purchase - Buy the full comic
//! - POST /api/comics/{id}/view - Count a view
//! - GET /api/comics/{id}/analytics - Public counters
//! - GET|POST /api/comics/{id}/reviews - Reviews, newest first / submit
//! - GET /api/comics/{id}/rating - Average rating
//! - GET|POST /api/comics/{id}/favorite - Favorite state / toggle
//! - GET /api/comics/{id}/progress - Caller's latest position
//! - POST /api/comics/{id}/history - Mark the comic as opened

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use mangashelf_core::{
    AnalyticsRecord, Chapter, Comic, ComicId, RatingSummary, ReadingProgress, Review, Transaction,
};
use mangashelf_store::Receipt;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extract::Identity;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ComicQuery {
    pub category: Option<String>,
    /// Case-insensitive title search.
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub has_access: bool,
}

/// Outcome of a purchase.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub purchased_at: DateTime<Utc>,
    pub balance: i64,
    pub transaction: Option<Transaction>,
}

impl From<Receipt> for PurchaseResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            purchased_at: receipt.purchased_at,
            balance: receipt.balance,
            transaction: receipt.transaction,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub favorited: bool,
    pub count: i64,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_comics(
    State(state): State<AppState>,
    Query(query): Query<ComicQuery>,
) -> ApiResult<Json<Vec<Comic>>> {
    let catalog = &state.services().catalog;
    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let comics = match query.q.as_deref().filter(|q| !q.trim().is_empty()) {
        Some(q) => catalog.search_comics(q, category).await?,
        None => catalog.list_comics(category).await?,
    };
    Ok(Json(comics))
}

async fn get_comic(State(state): State<AppState>, Path(id): Path<ComicId>) -> ApiResult<Json<Comic>> {
    Ok(Json(state.services().catalog.get_comic(id).await?))
}

async fn list_chapters(
    State(state): State<AppState>,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<Vec<Chapter>>> {
    Ok(Json(state.services().catalog.list_chapters(id).await?))
}

async fn comic_access(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<AccessResponse>> {
    let has_access = state
        .services()
        .entitlements
        .has_comic_access(&identity.user_id, id)
        .await?;
    Ok(Json(AccessResponse { has_access }))
}

async fn purchase_comic(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
) -> ApiResult<(StatusCode, Json<PurchaseResponse>)> {
    let receipt = state
        .services()
        .purchases
        .purchase_comic(&identity.user_id, id)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<AnalyticsRecord>> {
    state.services().catalog.get_comic(id).await?;
    Ok(Json(state.services().analytics.increment_views(id).await?))
}

async fn comic_analytics(
    State(state): State<AppState>,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<AnalyticsRecord>> {
    state
        .services()
        .analytics
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No analytics for comic {id}")))
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(state.services().reviews.list_for_comic(id).await?))
}

async fn submit_review(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Json<Review>> {
    let review = state
        .services()
        .reviews
        .submit(&identity.user_id, id, request.rating, &request.comment)
        .await?;
    Ok(Json(review))
}

async fn rating(
    State(state): State<AppState>,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<RatingSummary>> {
    Ok(Json(state.services().reviews.average_rating(id).await?))
}

async fn favorite_state(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<FavoriteResponse>> {
    let favorites = &state.services().favorites;
    Ok(Json(FavoriteResponse {
        favorited: favorites.is_favorited(&identity.user_id, id).await?,
        count: favorites.favorite_count(id).await?,
    }))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<FavoriteResponse>> {
    let favorites = &state.services().favorites;
    let favorited = favorites.toggle(&identity.user_id, id).await?;
    Ok(Json(FavoriteResponse {
        favorited,
        count: favorites.favorite_count(id).await?,
    }))
}

async fn get_progress(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
) -> ApiResult<Json<Option<ReadingProgress>>> {
    Ok(Json(
        state
            .services()
            .reading
            .get_progress(&identity.user_id, id)
            .await?,
    ))
}

async fn add_to_history(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
) -> ApiResult<StatusCode> {
    state
        .services()
        .reading
        .add_to_history(&identity.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/comics", get(list_comics))
        .route("/api/comics/{id}", get(get_comic))
        .route("/api/comics/{id}/chapters", get(list_chapters))
        .route("/api/comics/{id}/access", get(comic_access))
        .route("/api/comics/{id}/purchase", post(purchase_comic))
        .route("/api/comics/{id}/view", post(record_view))
        .route("/api/comics/{id}/analytics", get(comic_analytics))
        .route("/api/comics/{id}/reviews", get(list_reviews).post(submit_review))
        .route("/api/comics/{id}/rating", get(rating))
        .route("/api/comics/{id}/favorite", get(favorite_state).post(toggle_favorite))
        .route("/api/comics/{id}/progress", get(get_progress))
        .route("/api/comics/{id}/history", post(add_to_history))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_request_comment_defaults() {
        let request: ReviewRequest = serde_json::from_str(r#"{"rating": 4}"#).unwrap();
        assert_eq!(request.rating, 4);
        assert!(request.comment.is_empty());
    }
}
