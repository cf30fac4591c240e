//! Administrator operations.
//!
//! Every handler passes the caller to an admin-guarded service, which answers
//! 403 `ADMIN_REQUIRED` for non-admins.
//!
//! Wallets:
//! - POST /api/admin/topup - Credit coins to a username or user id
//! - POST /api/admin/refund - Same, logged as a refund
//! - GET /api/admin/users/{identifier} - Resolve a username or user id
//!
//! Bans:
//! - GET /api/admin/bans - `?include_inactive=true` for history
//! - POST /api/admin/bans - Permanent ban
//! - POST /api/admin/suspensions - Suspension for `days`
//! - DELETE /api/admin/bans/{id} - Unban
//!
//! Catalog:
//! - POST /api/admin/comics, PUT|DELETE /api/admin/comics/{id}
//! - POST /api/admin/comics/{id}/chapters
//! - PATCH|DELETE /api/admin/chapters/{id}
//! - POST /api/admin/chapters/{id}/pages, DELETE /api/admin/pages/{id}
//! - POST /api/admin/featured, DELETE /api/admin/featured/{id}
//! - POST /api/admin/coin-packages, PATCH /api/admin/coin-packages/{id}
//! - GET|POST /api/admin/reserved-usernames, DELETE /api/admin/reserved-usernames/{id}
//!
//! Analytics:
//! - GET /api/admin/analytics/top - `?limit=`
//! - GET /api/admin/analytics/revenue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use mangashelf_core::{
    AnalyticsRecord, BanId, BanRecord, Chapter, ChapterId, ChapterPatch, CoinPackage,
    CoinPackageId, CoinPackagePatch, Comic, ComicDraft, ComicId, FeaturedId, FeaturedSlot, Page,
    PageId, ReservedUsername, ReservedUsernameId, UserId, Wallet,
};
use mangashelf_store::{NewChapter, NewCoinPackage};
use serde::{Deserialize, Serialize};

use super::LimitQuery;
use crate::error::ApiResult;
use crate::extract::Identity;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    /// Username or user id.
    pub identifier: String,
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedUser {
    pub user_id: UserId,
    pub wallet: Option<Wallet>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BanListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub identifier: String,
    pub reason: String,
    pub days: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub page_number: i32,
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedRequest {
    pub comic_id: ComicId,
    #[serde(default)]
    pub priority: i32,
    /// Defaults to now.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RevenueResponse {
    pub total_revenue: i64,
}

// ============================================================================
// Wallets
// ============================================================================

async fn topup(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreditRequest>,
) -> ApiResult<Json<Wallet>> {
    let description = request.description.as_deref().unwrap_or("Admin top-up");
    let wallet = state
        .services()
        .wallets
        .topup(&identity.user_id, &request.identifier, request.amount, description)
        .await?;
    Ok(Json(wallet))
}

async fn refund(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<CreditRequest>,
) -> ApiResult<Json<Wallet>> {
    let description = request.description.as_deref().unwrap_or("Admin refund");
    let wallet = state
        .services()
        .wallets
        .refund(&identity.user_id, &request.identifier, request.amount, description)
        .await?;
    Ok(Json(wallet))
}

async fn resolve_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(identifier): Path<String>,
) -> ApiResult<Json<ResolvedUser>> {
    let services = state.services();
    services.admins.authorize(&identity.user_id).await?;
    let resolved = services.resolver.resolve(&identifier).await?;
    Ok(Json(ResolvedUser {
        user_id: resolved.user_id,
        wallet: resolved.wallet,
    }))
}

// ============================================================================
// Bans
// ============================================================================

async fn list_bans(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<BanListQuery>,
) -> ApiResult<Json<Vec<BanRecord>>> {
    Ok(Json(
        state
            .services()
            .bans
            .list_bans(&identity.user_id, query.include_inactive)
            .await?,
    ))
}

async fn ban(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<BanRequest>,
) -> ApiResult<(StatusCode, Json<BanRecord>)> {
    let record = state
        .services()
        .bans
        .ban(&identity.user_id, &request.identifier, &request.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn suspend(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<SuspendRequest>,
) -> ApiResult<(StatusCode, Json<BanRecord>)> {
    let record = state
        .services()
        .bans
        .suspend(&identity.user_id, &request.identifier, &request.reason, request.days)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn unban(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<BanId>,
) -> ApiResult<Json<BanRecord>> {
    Ok(Json(state.services().bans.unban(&identity.user_id, id).await?))
}

// ============================================================================
// Catalog
// ============================================================================

async fn create_comic(
    State(state): State<AppState>,
    identity: Identity,
    Json(draft): Json<ComicDraft>,
) -> ApiResult<(StatusCode, Json<Comic>)> {
    let comic = state
        .services()
        .catalog
        .create_comic(&identity.user_id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(comic)))
}

async fn update_comic(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
    Json(draft): Json<ComicDraft>,
) -> ApiResult<Json<Comic>> {
    Ok(Json(
        state
            .services()
            .catalog
            .update_comic(&identity.user_id, id, draft)
            .await?,
    ))
}

async fn delete_comic(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ComicId>,
) -> ApiResult<StatusCode> {
    state
        .services()
        .catalog
        .delete_comic(&identity.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_chapter(
    State(state): State<AppState>,
    identity: Identity,
    Path(comic_id): Path<ComicId>,
    Json(new): Json<NewChapter>,
) -> ApiResult<(StatusCode, Json<Chapter>)> {
    let chapter = state
        .services()
        .catalog
        .create_chapter(&identity.user_id, comic_id, new)
        .await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

async fn update_chapter(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ChapterId>,
    Json(patch): Json<ChapterPatch>,
) -> ApiResult<Json<Chapter>> {
    Ok(Json(
        state
            .services()
            .catalog
            .update_chapter(&identity.user_id, id, patch)
            .await?,
    ))
}

async fn delete_chapter(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ChapterId>,
) -> ApiResult<StatusCode> {
    state
        .services()
        .catalog
        .delete_chapter(&identity.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_page(
    State(state): State<AppState>,
    identity: Identity,
    Path(chapter_id): Path<ChapterId>,
    Json(request): Json<PageRequest>,
) -> ApiResult<(StatusCode, Json<Page>)> {
    let page = state
        .services()
        .catalog
        .add_page(&identity.user_id, chapter_id, request.page_number, &request.image_url)
        .await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn remove_page(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<PageId>,
) -> ApiResult<StatusCode> {
    state
        .services()
        .catalog
        .remove_page(&identity.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_featured(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<FeaturedRequest>,
) -> ApiResult<(StatusCode, Json<FeaturedSlot>)> {
    let start_date = request.start_date.unwrap_or_else(Utc::now);
    let slot = state
        .services()
        .catalog
        .add_featured(
            &identity.user_id,
            request.comic_id,
            request.priority,
            start_date,
            request.end_date,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn remove_featured(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<FeaturedId>,
) -> ApiResult<StatusCode> {
    state
        .services()
        .catalog
        .remove_featured(&identity.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_coin_package(
    State(state): State<AppState>,
    identity: Identity,
    Json(new): Json<NewCoinPackage>,
) -> ApiResult<(StatusCode, Json<CoinPackage>)> {
    let package = state
        .services()
        .catalog
        .create_coin_package(&identity.user_id, new)
        .await?;
    Ok((StatusCode::CREATED, Json(package)))
}

async fn update_coin_package(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<CoinPackageId>,
    Json(patch): Json<CoinPackagePatch>,
) -> ApiResult<Json<CoinPackage>> {
    Ok(Json(
        state
            .services()
            .catalog
            .update_coin_package(&identity.user_id, id, patch)
            .await?,
    ))
}

async fn list_reserved(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Vec<ReservedUsername>>> {
    let services = state.services();
    services.admins.authorize(&identity.user_id).await?;
    Ok(Json(services.reserved.list().await?))
}

async fn reserve(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<ReserveRequest>,
) -> ApiResult<(StatusCode, Json<ReservedUsername>)> {
    let reserved = state
        .services()
        .reserved
        .add(&identity.user_id, &request.username)
        .await?;
    Ok((StatusCode::CREATED, Json(reserved)))
}

async fn release(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<ReservedUsernameId>,
) -> ApiResult<StatusCode> {
    state
        .services()
        .reserved
        .remove(&identity.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Analytics
// ============================================================================

async fn top_comics(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<AnalyticsRecord>>> {
    Ok(Json(
        state
            .services()
            .analytics
            .top_comics(&identity.user_id, query.limit)
            .await?,
    ))
}

async fn revenue(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<RevenueResponse>> {
    let total_revenue = state
        .services()
        .analytics
        .total_revenue(&identity.user_id)
        .await?;
    Ok(Json(RevenueResponse { total_revenue }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/topup", post(topup))
        .route("/api/admin/refund", post(refund))
        .route("/api/admin/users/{identifier}", get(resolve_user))
        .route("/api/admin/bans", get(list_bans).post(ban))
        .route("/api/admin/bans/{id}", delete(unban))
        .route("/api/admin/suspensions", post(suspend))
        .route("/api/admin/comics", post(create_comic))
        .route("/api/admin/comics/{id}", put(update_comic).delete(delete_comic))
        .route("/api/admin/comics/{id}/chapters", post(create_chapter))
        .route("/api/admin/chapters/{id}", patch(update_chapter).delete(delete_chapter))
        .route("/api/admin/chapters/{id}/pages", post(add_page))
        .route("/api/admin/pages/{id}", delete(remove_page))
        .route("/api/admin/featured", post(add_featured))
        .route("/api/admin/featured/{id}", delete(remove_featured))
        .route("/api/admin/coin-packages", post(create_coin_package))
        .route("/api/admin/coin-packages/{id}", patch(update_coin_package))
        .route("/api/admin/reserved-usernames", get(list_reserved).post(reserve))
        .route("/api/admin/reserved-usernames/{id}", delete(release))
        .route("/api/admin/analytics/top", get(top_comics))
        .route("/api/admin/analytics/revenue", get(revenue))
}
