//! Chapter access, purchase, pages and reading progress.
//!
//! - GET /api/chapters/{id} - One chapter
//! - GET /api/chapters/{id}/access - Whether the caller may read it
//! - POST /api/chapters/{id}/purchase - Buy the single chapter
//! - GET /api/chapters/{id}/pages - Pages, for entitled callers
//! - PUT /api/chapters/{id}/progress - Save the reading position

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use mangashelf_core::{Chapter, ChapterId, Page, ReadingProgress};
use serde::Deserialize;

use super::comics::{AccessResponse, PurchaseResponse};
use crate::error::{ApiError, ApiResult};
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub current_page: i32,
    pub total_pages: i32,
}

async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<ChapterId>,
) -> ApiResult<Json<Chapter>> {
    Ok(Json(state.services().catalog.get_chapter(id).await?))
}

async fn chapter_access(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ChapterId>,
) -> ApiResult<Json<AccessResponse>> {
    let has_access = state
        .services()
        .entitlements
        .has_chapter_access(&identity.user_id, id)
        .await?;
    Ok(Json(AccessResponse { has_access }))
}

async fn purchase_chapter(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ChapterId>,
) -> ApiResult<(StatusCode, Json<PurchaseResponse>)> {
    let receipt = state
        .services()
        .purchases
        .purchase_chapter(&identity.user_id, id)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

async fn read_pages(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ChapterId>,
) -> ApiResult<Json<Vec<Page>>> {
    Ok(Json(
        state
            .services()
            .catalog
            .read_pages(&identity.user_id, id)
            .await?,
    ))
}

async fn save_progress(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ChapterId>,
    Json(request): Json<ProgressRequest>,
) -> ApiResult<Json<ReadingProgress>> {
    if request.current_page < 0 || request.total_pages < request.current_page {
        return Err(ApiError::BadRequest(format!(
            "page {} of {} is out of range",
            request.current_page, request.total_pages
        )));
    }
    let chapter = state.services().catalog.get_chapter(id).await?;
    let progress = state
        .services()
        .reading
        .update_progress(
            &identity.user_id,
            chapter.comic_id,
            id,
            request.current_page,
            request.total_pages,
        )
        .await?;
    Ok(Json(progress))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/chapters/{id}", get(get_chapter))
        .route("/api/chapters/{id}/access", get(chapter_access))
        .route("/api/chapters/{id}/purchase", post(purchase_chapter))
        .route("/api/chapters/{id}/pages", get(read_pages))
        .route("/api/chapters/{id}/progress", put(save_progress))
}
