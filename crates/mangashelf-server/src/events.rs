//! Notification fan-out to connected SSE clients.
//!
//! Every notification the services write is handed to the
//! [`NotificationBroadcaster`], which forwards it to the owner's open
//! streams. Delivery is best effort: a user with no open stream reads the
//! notification later from the list endpoint.
//!
//! # Architecture
//!
//! - Uses `tokio::sync::broadcast` for multi-subscriber pub/sub
//! - One channel per user (created lazily on first subscription)
//! - A [`Subscription`] sweeps channels left without subscribers when it is
//!   dropped, via [`NotificationBroadcaster::cleanup_empty_channels`]
//!
//! # Event Types
//!
//! - `notification`: a notification was written for the user
//! - `heartbeat`: sent periodically to keep connections alive
//! - `catchup`: the subscriber fell behind and should re-list

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mangashelf_core::{Notification, UserId};
use mangashelf_store::NotificationSink;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};

/// Default channel capacity for broadcast channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Heartbeat interval in seconds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Event Types
// ============================================================================

/// An event sent down a user's notification stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Notification(NotificationEvent),
    /// Keep-alive. Carries no payload because the same event is replayed on
    /// every interval.
    Heartbeat,
    Catchup(CatchupEvent),
}

impl StreamEvent {
    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::Heartbeat => "heartbeat",
            Self::Catchup(_) => "catchup",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub notification: Notification,
}

/// Sent when the subscriber's buffer overflowed.
#[derive(Debug, Clone, Serialize)]
pub struct CatchupEvent {
    pub events_missed: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Broadcaster
// ============================================================================

/// Manages one broadcast channel per user.
#[derive(Debug, Clone)]
pub struct NotificationBroadcaster {
    channels: Arc<RwLock<HashMap<UserId, broadcast::Sender<StreamEvent>>>>,
    capacity: usize,
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Subscribe to a user's stream, creating the channel if needed.
    pub async fn subscribe(&self, user_id: &UserId) -> broadcast::Receiver<StreamEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(user_id) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write().await;
        // Another task may have created it in between.
        if let Some(sender) = channels.get(user_id) {
            return sender.subscribe();
        }

        let (sender, receiver) = broadcast::channel(self.capacity);
        channels.insert(user_id.clone(), sender);

        tracing::debug!(
            user_id = %user_id,
            capacity = self.capacity,
            "Created notification channel"
        );

        receiver
    }

    /// Subscribe on behalf of a long-lived stream. The channel is swept once
    /// the returned [`Subscription`] and every other receiver are gone.
    pub async fn subscribe_stream(&self, user_id: &UserId) -> Subscription {
        Subscription {
            receiver: Some(self.subscribe(user_id).await),
            user_id: user_id.clone(),
            broadcaster: self.clone(),
        }
    }

    /// Publish to every open stream of the user.
    ///
    /// Returns how many receivers got the event, or `None` if the user never
    /// subscribed.
    pub async fn publish(&self, user_id: &UserId, event: StreamEvent) -> Option<usize> {
        let channels = self.channels.read().await;
        let sender = channels.get(user_id)?;
        match sender.send(event) {
            Ok(count) => {
                tracing::trace!(user_id = %user_id, receivers = count, "Published stream event");
                Some(count)
            }
            Err(_) => {
                tracing::trace!(user_id = %user_id, "No subscribers for stream event");
                Some(0)
            }
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn subscriber_count(&self, user_id: &UserId) -> usize {
        let channels = self.channels.read().await;
        channels.get(user_id).map_or(0, |s| s.receiver_count())
    }

    /// Drops channels nobody listens to. Returns how many were removed.
    pub async fn cleanup_empty_channels(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|user_id, sender| {
            let has_receivers = sender.receiver_count() > 0;
            if !has_receivers {
                tracing::debug!(user_id = %user_id, "Cleaning up empty notification channel");
            }
            has_receivers
        });
        before - channels.len()
    }
}

/// One open stream's receiver.
#[derive(Debug)]
pub struct Subscription {
    receiver: Option<broadcast::Receiver<StreamEvent>>,
    user_id: UserId,
    broadcaster: NotificationBroadcaster,
}

impl Subscription {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub async fn recv(&mut self) -> Result<StreamEvent, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // The receiver must be gone before the sweep counts subscribers.
        drop(self.receiver.take());
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let broadcaster = self.broadcaster.clone();
        let user_id = self.user_id.clone();
        handle.spawn(async move {
            let removed = broadcaster.cleanup_empty_channels().await;
            tracing::debug!(user_id = %user_id, removed, "Notification stream closed");
        });
    }
}

#[async_trait]
impl NotificationSink for NotificationBroadcaster {
    async fn deliver(&self, notification: &Notification) {
        let event = StreamEvent::Notification(NotificationEvent {
            notification: notification.clone(),
        });
        self.publish(&notification.user_id, event).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mangashelf_core::{NotificationId, NotificationKind};

    fn notification(user: &str) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id: UserId::from(user),
            kind: NotificationKind::LowBalance,
            title: "Low balance".to_string(),
            message: "Only 3 coins left".to_string(),
            read: false,
            link: Some("/coins".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_broadcaster_subscribe() {
        let broadcaster = NotificationBroadcaster::new();
        let user = UserId::from("alice");

        let _r1 = broadcaster.subscribe(&user).await;
        let _r2 = broadcaster.subscribe(&user).await;

        assert_eq!(broadcaster.channel_count().await, 1);
        assert_eq!(broadcaster.subscriber_count(&user).await, 2);
    }

    #[tokio::test]
    async fn test_deliver_reaches_only_owner() {
        let broadcaster = NotificationBroadcaster::new();
        let mut alice = broadcaster.subscribe(&UserId::from("alice")).await;
        let mut bob = broadcaster.subscribe(&UserId::from("bob")).await;

        broadcaster.deliver(&notification("alice")).await;

        match alice.recv().await.unwrap() {
            StreamEvent::Notification(e) => {
                assert_eq!(e.notification.kind, NotificationKind::LowBalance)
            }
            other => panic!("expected notification, got {other:?}"),
        }
        assert!(bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_channel() {
        let broadcaster = NotificationBroadcaster::new();
        assert_eq!(
            broadcaster
                .publish(&UserId::from("nobody"), StreamEvent::Heartbeat)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_broadcaster_cleanup() {
        let broadcaster = NotificationBroadcaster::new();
        {
            let _receiver = broadcaster.subscribe(&UserId::from("alice")).await;
        }

        assert_eq!(broadcaster.cleanup_empty_channels().await, 1);
        assert_eq!(broadcaster.channel_count().await, 0);
    }

    async fn settle(broadcaster: &NotificationBroadcaster, expected: usize) -> usize {
        for _ in 0..20 {
            if broadcaster.channel_count().await == expected {
                break;
            }
            tokio::task::yield_now().await;
        }
        broadcaster.channel_count().await
    }

    #[tokio::test]
    async fn test_dropped_stream_sweeps_its_channel() {
        let broadcaster = NotificationBroadcaster::new();
        let alice = UserId::from("alice");

        let first = broadcaster.subscribe_stream(&alice).await;
        let mut second = broadcaster.subscribe_stream(&alice).await;
        assert_eq!(broadcaster.subscriber_count(&alice).await, 2);

        drop(first);
        assert_eq!(settle(&broadcaster, 1).await, 1);
        assert_eq!(broadcaster.subscriber_count(&alice).await, 1);

        broadcaster.deliver(&notification("alice")).await;
        assert!(matches!(
            second.recv().await,
            Ok(StreamEvent::Notification(_))
        ));

        drop(second);
        assert_eq!(settle(&broadcaster, 0).await, 0);
    }

    #[test]
    fn test_heartbeat_has_no_payload() {
        let json = serde_json::to_string(&StreamEvent::Heartbeat).unwrap();
        assert_eq!(json, r#"{"type":"heartbeat"}"#);
        assert_eq!(StreamEvent::Heartbeat.name(), "heartbeat");
    }

    #[test]
    fn test_event_serialization() {
        let event = StreamEvent::Notification(NotificationEvent {
            notification: notification("alice"),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"type":"notification","notification":{"#));
        assert!(json.contains(r#""type":"low_balance""#));
        assert_eq!(event.name(), "notification");

        let catchup = StreamEvent::Catchup(CatchupEvent {
            events_missed: 7,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_string(&catchup).unwrap();
        assert!(json.contains(r#""events_missed":7"#));
    }
}
