use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserSummary;

/// Notification type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Someone asked to become friends
    FriendRequestReceived,
    /// A request the receiver sent was accepted
    FriendRequestAccepted,
    FriendRequestDeclined,
    /// New message in a room the receiver participates in
    NewMessage,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::FriendRequestReceived => "friend_request_received",
            NotificationType::FriendRequestAccepted => "friend_request_accepted",
            NotificationType::FriendRequestDeclined => "friend_request_declined",
            NotificationType::NewMessage => "new_message",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub sender: Option<UserSummary>,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: Option<String>,
    pub chat_room_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flat row with the optional sender projection
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub sender_name: Option<String>,
    pub sender_profile_image_url: Option<String>,
    pub notification_type: NotificationType,
    pub message: Option<String>,
    pub chat_room_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let sender = match (row.sender_id, row.sender_name) {
            (Some(id), Some(name)) => Some(UserSummary {
                id,
                name,
                profile_image_url: row.sender_profile_image_url,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            receiver_id: row.receiver_id,
            sender,
            notification_type: row.notification_type,
            message: row.message,
            chat_room_id: row.chat_room_id,
            is_read: row.is_read,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub receiver_id: Uuid,
    pub notification_type: NotificationType,
    pub sender_id: Option<Uuid>,
    pub message: Option<String>,
    pub chat_room_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(receiver_id: Uuid, notification_type: NotificationType) -> Self {
        Self {
            receiver_id,
            notification_type,
            sender_id: None,
            message: None,
            chat_room_id: None,
        }
    }

    pub fn from_sender(mut self, sender_id: Uuid) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn in_room(mut self, chat_room_id: Uuid) -> Self {
        self.chat_room_id = Some(chat_room_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_wire_format() {
        let json = serde_json::to_string(&NotificationType::FriendRequestAccepted).unwrap();
        assert_eq!(json, "\"FRIEND_REQUEST_ACCEPTED\"");
    }

    #[test]
    fn test_row_without_sender() {
        let row = NotificationRow {
            id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            sender_id: None,
            sender_name: None,
            sender_profile_image_url: None,
            notification_type: NotificationType::NewMessage,
            message: Some("New message in general".into()),
            chat_room_id: None,
            is_read: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let notification = Notification::from(row);
        assert!(notification.sender.is_none());
        assert!(!notification.is_read);
    }
}
