//! End-to-end tests of the HTTP API over the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mangashelf_core::UserId;
use mangashelf_server::{
    config::{ServerConfig, StoreBackend},
    events::StreamEvent,
    extract::DEV_IDENTITY_HEADER,
    routes::build_router,
    AppState,
};
use mangashelf_store::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN: &str = "admin-1";
const READER: &str = "reader-1";

async fn setup() -> (AppState, Router) {
    let config = ServerConfig {
        store_backend: StoreBackend::Memory,
        allow_dev_identity: true,
        ..ServerConfig::default()
    };
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    state
        .services()
        .admins
        .add_admin(&UserId::from(ADMIN))
        .await
        .unwrap();
    let app = build_router(state.clone());
    (state, app)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(DEV_IDENTITY_HEADER, user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_comic(app: &Router, title: &str, price: i64) -> String {
    let (status, comic) = send(
        app,
        "POST",
        "/api/admin/comics",
        Some(ADMIN),
        Some(json!({ "title": title, "price": price, "category": "Manga" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    comic["id"].as_str().unwrap().to_string()
}

async fn topup(app: &Router, identifier: &str, amount: i64) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/admin/topup",
        Some(ADMIN),
        Some(json!({ "identifier": identifier, "amount": amount })),
    )
    .await
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_health() {
    let (_, app) = setup().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (_, app) = setup().await;
    let (status, body) = send(&app, "GET", "/api/wallet", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_purchase_flow() {
    let (_, app) = setup().await;
    let comic_id = create_comic(&app, "Blue Period", 30).await;

    let (status, wallet) = topup(&app, READER, 100).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["coins"], 100);

    let uri = format!("/api/comics/{comic_id}/purchase");
    let (status, receipt) = send(&app, "POST", &uri, Some(READER), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["balance"], 70);
    assert_eq!(receipt["transaction"]["amount"], -30);
    assert_eq!(receipt["transaction"]["kind"], "purchase");

    let (status, body) = send(&app, "POST", &uri, Some(READER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_PURCHASED");

    let (_, wallet) = send(&app, "GET", "/api/wallet", Some(READER), None).await;
    assert_eq!(wallet["coins"], 70);

    let (_, transactions) =
        send(&app, "GET", "/api/wallet/transactions", Some(READER), None).await;
    let kinds: Vec<&str> = transactions
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["purchase", "topup"]);

    let (_, access) = send(
        &app,
        "GET",
        &format!("/api/comics/{comic_id}/access"),
        Some(READER),
        None,
    )
    .await;
    assert_eq!(access["has_access"], true);

    let (_, library) = send(&app, "GET", "/api/me/library", Some(READER), None).await;
    assert_eq!(library["comics"].as_array().unwrap().len(), 1);

    let (_, reconciliation) = send(&app, "GET", "/api/wallet/reconcile", Some(READER), None).await;
    assert_eq!(reconciliation["consistent"], true);
}

#[tokio::test]
async fn test_insufficient_funds_is_payment_required() {
    let (_, app) = setup().await;
    let comic_id = create_comic(&app, "Vagabond", 50).await;
    topup(&app, READER, 20).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/comics/{comic_id}/purchase"),
        Some(READER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(error_code(&body), "INSUFFICIENT_FUNDS");

    let (_, wallet) = send(&app, "GET", "/api/wallet", Some(READER), None).await;
    assert_eq!(wallet["coins"], 20);
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let (_, app) = setup().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/admin/topup",
        Some(READER),
        Some(json!({ "identifier": READER, "amount": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "ADMIN_REQUIRED");

    let (status, _) = send(&app, "GET", "/api/admin/analytics/revenue", Some(READER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_amount_is_bad_request() {
    let (_, app) = setup().await;
    let (status, body) = topup(&app, READER, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_AMOUNT");
}

#[tokio::test]
async fn test_banned_user_cannot_purchase() {
    let (_, app) = setup().await;
    let comic_id = create_comic(&app, "Monster", 10).await;
    topup(&app, READER, 100).await;

    let (status, ban) = send(
        &app,
        "POST",
        "/api/admin/suspensions",
        Some(ADMIN),
        Some(json!({ "identifier": READER, "reason": "spam", "days": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ban["kind"], "suspend");

    let (_, me) = send(&app, "GET", "/api/me/status", Some(READER), None).await;
    assert_eq!(me["ban"]["is_banned"], true);
    assert_eq!(me["ban"]["type"], "suspend");
    assert_eq!(me["is_admin"], false);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/comics/{comic_id}/purchase"),
        Some(READER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "BANNED");

    let ban_id = ban["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/admin/bans/{ban_id}"),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/comics/{comic_id}/purchase"),
        Some(READER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_pages_require_entitlement() {
    let (_, app) = setup().await;
    let comic_id = create_comic(&app, "Berserk", 100).await;
    let (status, chapter) = send(
        &app,
        "POST",
        &format!("/api/admin/comics/{comic_id}/chapters"),
        Some(ADMIN),
        Some(json!({ "chapter_number": 1, "title": "The Black Swordsman", "price": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let chapter_id = chapter["id"].as_str().unwrap().to_string();

    send(
        &app,
        "POST",
        &format!("/api/admin/chapters/{chapter_id}/pages"),
        Some(ADMIN),
        Some(json!({ "page_number": 1, "image_url": "https://cdn.example/p1.webp" })),
    )
    .await;

    let pages_uri = format!("/api/chapters/{chapter_id}/pages");
    let (status, body) = send(&app, "GET", &pages_uri, Some(READER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "NOT_ENTITLED");

    topup(&app, READER, 10).await;
    let (status, receipt) = send(
        &app,
        "POST",
        &format!("/api/chapters/{chapter_id}/purchase"),
        Some(READER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["balance"], 5);

    let (status, pages) = send(&app, "GET", &pages_uri, Some(READER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pages.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_purchase_notification_reaches_stream_subscriber() {
    let (state, app) = setup().await;
    let comic_id = create_comic(&app, "Pluto", 95).await;
    topup(&app, READER, 100).await;

    let mut rx = state.broadcaster().subscribe(&UserId::from(READER)).await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/comics/{comic_id}/purchase"),
        Some(READER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Purchase receipt, then the low-balance warning (5 < 10).
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let StreamEvent::Notification(event) = event {
            kinds.push(event.notification.kind.to_string());
        }
    }
    assert_eq!(kinds, vec!["purchase", "low_balance"]);

    let (_, unread) = send(
        &app,
        "GET",
        "/api/me/notifications/unread-count",
        Some(READER),
        None,
    )
    .await;
    assert_eq!(unread["unread"], 2);

    let (_, marked) = send(&app, "POST", "/api/me/notifications/read-all", Some(READER), None).await;
    assert_eq!(marked["marked"], 2);
}

#[tokio::test]
async fn test_favorite_toggle() {
    let (_, app) = setup().await;
    let comic_id = create_comic(&app, "Dorohedoro", 0).await;
    let uri = format!("/api/comics/{comic_id}/favorite");

    let (_, body) = send(&app, "POST", &uri, Some(READER), None).await;
    assert_eq!(body["favorited"], true);
    assert_eq!(body["count"], 1);

    let (_, body) = send(&app, "POST", &uri, Some(READER), None).await;
    assert_eq!(body["favorited"], false);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_unknown_comic_is_not_found() {
    let (_, app) = setup().await;
    let uri = format!("/api/comics/{}", uuid::Uuid::new_v4());
    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}
