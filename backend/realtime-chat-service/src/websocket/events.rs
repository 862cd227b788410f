//! Outbound WebSocket events
//!
//! Every event is a JSON object whose `type` names the event, e.g.
//! ```json
//! { "type": "message-deleted", "messageId": "..." }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ChatMessage, Friend, Notification};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Persisted message, sent to every session in the room
    #[serde(rename = "message-created")]
    MessageCreated { message: ChatMessage },

    #[serde(rename = "message-deleted")]
    MessageDeleted {
        #[serde(rename = "messageId")]
        message_id: Uuid,
    },

    #[serde(rename = "new-notification")]
    NewNotification { notification: Notification },

    #[serde(rename = "new-friend-request")]
    NewFriendRequest { friend: Friend },

    /// Names that started (`isTyping`) or stopped typing in the room
    #[serde(rename = "typing-users-updated")]
    TypingUsersUpdated {
        #[serde(rename = "roomId")]
        room_id: Uuid,
        #[serde(rename = "displayNames")]
        display_names: Vec<String>,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },

    #[serde(rename = "pong")]
    Pong,

    /// Failure of an event sent by this session only
    #[serde(rename = "error")]
    Error { message: String, code: String },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::MessageCreated { .. } => "message-created",
            ServerEvent::MessageDeleted { .. } => "message-deleted",
            ServerEvent::NewNotification { .. } => "new-notification",
            ServerEvent::NewFriendRequest { .. } => "new-friend-request",
            ServerEvent::TypingUsersUpdated { .. } => "typing-users-updated",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Serialize once for fan-out
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&AppError> for ServerEvent {
    fn from(err: &AppError) -> Self {
        ServerEvent::Error {
            message: err.public_message(),
            code: err.code().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deleted_shape() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(ServerEvent::MessageDeleted { message_id: id }).unwrap();

        assert_eq!(value["type"], "message-deleted");
        assert_eq!(value["messageId"], id.to_string());
    }

    #[test]
    fn test_typing_shape() {
        let room_id = Uuid::new_v4();
        let event = ServerEvent::TypingUsersUpdated {
            room_id,
            display_names: vec!["Ann".to_string()],
            is_typing: false,
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "typing-users-updated");
        assert_eq!(value["displayNames"][0], "Ann");
        assert_eq!(value["isTyping"], false);
        assert_eq!(event.event_type(), "typing-users-updated");
    }

    #[test]
    fn test_error_event_hides_infrastructure_detail() {
        let event = ServerEvent::from(&AppError::Database("socket closed".into()));
        let value = serde_json::to_value(event).unwrap();

        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "internal server error");
        assert_eq!(value["code"], "DATABASE_ERROR");
    }

    #[test]
    fn test_pong_has_only_type() {
        assert_eq!(
            ServerEvent::Pong.to_payload().unwrap(),
            r#"{"type":"pong"}"#
        );
    }
}
