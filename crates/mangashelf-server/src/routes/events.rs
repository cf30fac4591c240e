//! Server-Sent Events stream of the caller's notifications.
//!
//! Endpoint: GET /api/me/notifications/stream
//!
//! # Event Types
//!
//! - `notification`: a purchase receipt, low balance warning or new chapter
//! - `heartbeat`: sent every 30 seconds to keep the connection alive
//! - `catchup`: the client fell behind and should re-list its notifications
//!
//! ```text
//! event: notification
//! data: {"type":"notification","notification":{"id":"...","type":"purchase",...}}
//!
//! event: heartbeat
//! data: {"type":"heartbeat"}
//! ```

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiError;
use crate::events::{CatchupEvent, StreamEvent, Subscription, HEARTBEAT_INTERVAL_SECS};
use crate::extract::Identity;
use crate::state::AppState;

fn to_sse(event: &StreamEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().event(event.name()).data(data)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream event");
            None
        }
    }
}

/// GET /api/me/notifications/stream
///
/// Notifications are not replayed; on `catchup` the client should fetch
/// `/api/me/notifications`.
async fn subscribe_notifications(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.broadcaster().subscribe_stream(&identity.user_id).await;

    tracing::info!(user_id = %identity.user_id, "Client subscribed to notification stream");

    // Dropping the subscription with the stream sweeps the user's channel.
    let stream = stream::unfold(subscription, |mut sub: Subscription| async move {
        loop {
            match sub.recv().await {
                Ok(event) => {
                    if let Some(sse_event) = to_sse(&event) {
                        return Some((Ok(sse_event), sub));
                    }
                }
                Err(RecvError::Lagged(count)) => {
                    tracing::warn!(
                        user_id = %sub.user_id(),
                        events_missed = count,
                        "SSE client lagged, sending catchup event"
                    );
                    let catchup = StreamEvent::Catchup(CatchupEvent {
                        events_missed: count,
                        timestamp: Utc::now(),
                    });
                    if let Some(sse_event) = to_sse(&catchup) {
                        return Some((Ok(sse_event), sub));
                    }
                }
                Err(RecvError::Closed) => {
                    tracing::debug!(user_id = %sub.user_id(), "Notification channel closed, ending SSE stream");
                    return None;
                }
            }
        }
    });

    let keep_alive = KeepAlive::new()
        .interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS))
        .event(to_sse(&StreamEvent::Heartbeat).unwrap_or_else(|| Event::default().event("heartbeat")));

    Ok(Sse::new(stream).keep_alive(keep_alive))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/me/notifications/stream", get(subscribe_notifications))
}
