//! The caller's account views.
//!
//! - GET /api/me/status - Ban status and admin flag
//! - GET /api/me/library - Purchased comics and chapters
//! - GET /api/me/favorites - Favorited comics
//! - GET /api/me/continue-reading - Comics in progress
//! - GET /api/me/history - Recently opened comics
//! - GET /api/me/notifications - Newest first
//! - GET /api/me/notifications/unread-count
//! - POST /api/me/notifications/{id}/read
//! - POST /api/me/notifications/read-all

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mangashelf_core::{BanStatus, Chapter, Comic, Notification, NotificationId};
use mangashelf_store::{ContinueReading, RecentlyRead};
use serde::Serialize;

use super::LimitQuery;
use crate::error::ApiResult;
use crate::extract::Identity;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub is_admin: bool,
    pub ban: BanStatus,
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub comics: Vec<Comic>,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllResponse {
    pub marked: u64,
}

async fn status(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<StatusResponse>> {
    let services = state.services();
    Ok(Json(StatusResponse {
        is_admin: services.admins.is_admin(&identity.user_id).await?,
        ban: services.bans.get_status(&identity.user_id).await?,
    }))
}

async fn library(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<LibraryResponse>> {
    let purchases = &state.services().purchases;
    Ok(Json(LibraryResponse {
        comics: purchases.user_purchases(&identity.user_id).await?,
        chapters: purchases.user_chapter_purchases(&identity.user_id).await?,
    }))
}

async fn favorites(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Comic>>> {
    Ok(Json(
        state
            .services()
            .favorites
            .user_favorites(&identity.user_id)
            .await?,
    ))
}

async fn continue_reading(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<ContinueReading>>> {
    Ok(Json(
        state
            .services()
            .reading
            .continue_reading(&identity.user_id, query.limit)
            .await?,
    ))
}

async fn history(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<RecentlyRead>>> {
    Ok(Json(
        state
            .services()
            .reading
            .recently_read(&identity.user_id, query.limit)
            .await?,
    ))
}

async fn notifications(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(
        state
            .services()
            .notifications
            .list(&identity.user_id, query.limit)
            .await?,
    ))
}

async fn unread_count(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<UnreadCountResponse>> {
    let unread = state
        .services()
        .notifications
        .unread_count(&identity.user_id)
        .await?;
    Ok(Json(UnreadCountResponse { unread }))
}

async fn mark_read(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<NotificationId>,
) -> ApiResult<StatusCode> {
    state
        .services()
        .notifications
        .mark_as_read(&identity.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<MarkAllResponse>> {
    let marked = state
        .services()
        .notifications
        .mark_all_as_read(&identity.user_id)
        .await?;
    Ok(Json(MarkAllResponse { marked }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/me/status", get(status))
        .route("/api/me/library", get(library))
        .route("/api/me/favorites", get(favorites))
        .route("/api/me/continue-reading", get(continue_reading))
        .route("/api/me/history", get(history))
        .route("/api/me/notifications", get(notifications))
        .route("/api/me/notifications/unread-count", get(unread_count))
        .route("/api/me/notifications/{id}/read", post(mark_read))
        .route("/api/me/notifications/read-all", post(mark_all_read))
}
