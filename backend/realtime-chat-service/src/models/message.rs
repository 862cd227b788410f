use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserSummary;
use crate::error::{AppError, AppResult};

/// Message as returned to callers and broadcast to live sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_room_id: Uuid,
    pub content: String,
    pub images_url: Vec<String>,
    pub file_url: Option<String>,
    pub is_deleted: bool,
    pub sender: UserSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flat row joining `chat_messages` with the sender's projection
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub chat_room_id: Uuid,
    pub content: String,
    pub images_url: Vec<String>,
    pub file_url: Option<String>,
    pub is_deleted: bool,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            chat_room_id: row.chat_room_id,
            content: row.content,
            images_url: row.images_url,
            file_url: row.file_url,
            is_deleted: row.is_deleted,
            sender: UserSummary {
                id: row.sender_id,
                name: row.sender_name,
                profile_image_url: row.sender_profile_image_url,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Message about to be persisted. Attachments are URLs already stored
/// by the object-storage collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub chat_room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub images_url: Vec<String>,
    pub file_url: Option<String>,
}

impl NewMessage {
    pub fn text(chat_room_id: Uuid, sender_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            chat_room_id,
            sender_id,
            content: content.into(),
            images_url: Vec::new(),
            file_url: None,
        }
    }

    pub fn has_attachment(&self) -> bool {
        !self.images_url.is_empty() || self.file_url.is_some()
    }

    /// Empty content is accepted only alongside an attachment
    pub fn validate(&self) -> AppResult<()> {
        if self.content.trim().is_empty() && !self.has_attachment() {
            return Err(AppError::EmptyMessage);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_rejected() {
        let msg = NewMessage::text(Uuid::new_v4(), Uuid::new_v4(), "   ");
        assert_eq!(msg.validate(), Err(AppError::EmptyMessage));
    }

    #[test]
    fn test_empty_text_with_image_accepted() {
        let mut msg = NewMessage::text(Uuid::new_v4(), Uuid::new_v4(), "");
        msg.images_url.push("https://cdn.example.com/a.png".to_string());
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_empty_text_with_file_accepted() {
        let mut msg = NewMessage::text(Uuid::new_v4(), Uuid::new_v4(), "");
        msg.file_url = Some("https://cdn.example.com/report.pdf".to_string());
        assert!(msg.validate().is_ok());
    }
}
