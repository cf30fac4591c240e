use std::sync::Arc;

use async_trait::async_trait;
use mangashelf_core::{NewNotification, Notification, NotificationId, UserId};

use super::Ctx;
use crate::error::{StoreError, StoreResult};

/// Default page size of a notification listing.
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 20;

/// Receives every notification after it is persisted.
///
/// The server pushes them to connected SSE clients; delivery is best effort.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification);
}

/// Sink that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn deliver(&self, _notification: &Notification) {}
}

#[derive(Clone)]
pub struct Notifications {
    ctx: Ctx,
    sink: Arc<dyn NotificationSink>,
}

impl Notifications {
    pub(crate) fn new(ctx: Ctx, sink: Arc<dyn NotificationSink>) -> Self {
        Self { ctx, sink }
    }

    pub async fn create(&self, new: NewNotification) -> StoreResult<Notification> {
        let notification = new.into_notification(NotificationId::new(), self.ctx.now());
        self.ctx.backend.insert_notification(&notification).await?;
        tracing::debug!(
            user_id = %notification.user_id,
            kind = %notification.kind,
            "Notification created"
        );
        self.sink.deliver(&notification).await;
        Ok(notification)
    }

    /// Newest first; `limit` defaults to 20.
    pub async fn list(&self, user_id: &UserId, limit: Option<usize>) -> StoreResult<Vec<Notification>> {
        self.ctx
            .backend
            .list_notifications(user_id, limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT))
            .await
    }

    pub async fn unread_count(&self, user_id: &UserId) -> StoreResult<i64> {
        self.ctx.backend.unread_notifications(user_id).await
    }

    /// Only the owner may mark a notification; anyone else sees it as missing.
    pub async fn mark_as_read(&self, user_id: &UserId, id: NotificationId) -> StoreResult<()> {
        match self.ctx.backend.get_notification(id).await? {
            Some(notification) if notification.user_id == *user_id => {
                self.ctx.backend.mark_notification_read(id).await
            }
            _ => Err(StoreError::not_found("notification", id)),
        }
    }

    pub async fn mark_all_as_read(&self, user_id: &UserId) -> StoreResult<u64> {
        self.ctx.backend.mark_all_notifications_read(user_id).await
    }
}
