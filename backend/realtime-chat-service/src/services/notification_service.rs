use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{NewNotification, Notification};
use crate::repository::ChatStore;
use crate::websocket::{Broadcaster, ServerEvent};

/// Persists notifications and pushes them to the receiver's live sessions
///
/// Live delivery is push-only: an offline receiver finds the notification
/// through `list` later. There is no retry queue.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn ChatStore>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn ChatStore>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    pub async fn create(&self, notification: NewNotification) -> AppResult<Notification> {
        if self.store.find_user(notification.receiver_id).await?.is_none() {
            return Err(AppError::ReceiverNotFound);
        }
        if let Some(sender_id) = notification.sender_id {
            if self.store.find_user(sender_id).await?.is_none() {
                return Err(AppError::SenderNotFound);
            }
        }

        let created = self.store.insert_notification(&notification).await?;
        metrics::notification_created(created.notification_type.as_str());

        let delivered = self
            .broadcaster
            .to_user(
                created.receiver_id,
                &ServerEvent::NewNotification {
                    notification: created.clone(),
                },
            )
            .await;

        tracing::info!(
            notification_id = %created.id,
            receiver_id = %created.receiver_id,
            notification_type = created.notification_type.as_str(),
            delivered,
            "notification created"
        );

        Ok(created)
    }

    /// Side-effect variant: failures are logged and swallowed so the
    /// mutation that triggered the notification stands.
    pub async fn create_best_effort(&self, notification: NewNotification) -> Option<Notification> {
        let receiver_id = notification.receiver_id;
        let notification_type = notification.notification_type;
        match self.create(notification).await {
            Ok(created) => Some(created),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    %receiver_id,
                    notification_type = notification_type.as_str(),
                    "failed to create notification"
                );
                None
            }
        }
    }

    pub async fn list(&self, user_id: Uuid) -> AppResult<Vec<Notification>> {
        self.store.notifications_for_user(user_id).await
    }

    /// Marks one of the caller's notifications read. Notifications owned by
    /// someone else are reported as missing.
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<Notification> {
        let existing = self
            .store
            .find_notification(notification_id)
            .await?
            .ok_or(AppError::NotificationNotFound)?;
        if existing.receiver_id != user_id {
            return Err(AppError::NotificationNotFound);
        }
        if existing.is_read {
            return Ok(existing);
        }

        self.store
            .mark_notification_read(notification_id)
            .await?
            .ok_or(AppError::NotificationNotFound)
    }

    /// Returns how many notifications flipped to read
    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let updated = self.store.mark_all_notifications_read(user_id).await?;
        tracing::debug!(%user_id, updated, "marked notifications read");
        Ok(updated)
    }
}
