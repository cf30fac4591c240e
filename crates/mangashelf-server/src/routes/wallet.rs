//! The caller's wallet and transaction history.
//!
//! - GET /api/wallet - Balance and username
//! - POST /api/wallet - Open the wallet if it does not exist yet
//! - PUT /api/wallet/username - Choose a username
//! - GET /api/wallet/transactions - Ledger rows, newest first
//! - GET /api/wallet/reconcile - Balance checked against the ledger

use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use mangashelf_core::{Transaction, UserId, Wallet};
use mangashelf_store::Reconciliation;
use serde::{Deserialize, Serialize};

use super::LimitQuery;
use crate::error::ApiResult;
use crate::extract::Identity;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: UserId,
    /// `None` until the wallet exists.
    pub username: Option<String>,
    pub coins: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenWalletRequest {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetUsernameRequest {
    pub username: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_wallet(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<BalanceResponse>> {
    let wallets = &state.services().wallets;
    let coins = wallets.get_balance(&identity.user_id).await?;
    let username = wallets.get_username(&identity.user_id).await?;
    Ok(Json(BalanceResponse {
        user_id: identity.user_id,
        username,
        coins,
    }))
}

async fn open_wallet(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<OpenWalletRequest>,
) -> ApiResult<Json<Wallet>> {
    let wallet = state
        .services()
        .wallets
        .get_or_create_wallet(&identity.user_id, request.username.as_deref())
        .await?;
    Ok(Json(wallet))
}

async fn set_username(
    State(state): State<AppState>,
    identity: Identity,
    Json(request): Json<SetUsernameRequest>,
) -> ApiResult<Json<Wallet>> {
    let wallet = state
        .services()
        .wallets
        .set_username(&identity.user_id, &request.username)
        .await?;
    Ok(Json(wallet))
}

async fn list_transactions(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let transactions = state
        .services()
        .transactions
        .list_for_user(&identity.user_id, query.limit)
        .await?;
    Ok(Json(transactions))
}

async fn reconcile(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<Reconciliation>> {
    Ok(Json(
        state.services().wallets.reconcile(&identity.user_id).await?,
    ))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/wallet", get(get_wallet).post(open_wallet))
        .route("/api/wallet/username", put(set_username))
        .route("/api/wallet/transactions", get(list_transactions))
        .route("/api/wallet/reconcile", get(reconcile))
}
