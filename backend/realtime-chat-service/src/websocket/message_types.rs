use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound WebSocket events from client to server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        room_id: Uuid,
        #[serde(default)]
        content: String,
        #[serde(default)]
        images_url: Vec<String>,
        #[serde(default)]
        file_url: Option<String>,
    },

    #[serde(rename = "sendFriendRequest", rename_all = "camelCase")]
    SendFriendRequest { receiver_id: Uuid },

    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { room_id: Uuid, display_name: String },

    #[serde(rename = "stopTyping", rename_all = "camelCase")]
    StopTyping { room_id: Uuid, display_name: String },

    #[serde(rename = "ping")]
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_message_without_attachments() {
        let room_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"sendMessage","roomId":"{room_id}","content":"hello"}}"#);

        let event: ClientEvent = serde_json::from_str(&raw).unwrap();

        assert_eq!(
            event,
            ClientEvent::SendMessage {
                room_id,
                content: "hello".to_string(),
                images_url: Vec::new(),
                file_url: None,
            }
        );
    }

    #[test]
    fn test_parse_typing() {
        let room_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"typing","roomId":"{room_id}","displayName":"Ann"}}"#);

        let event: ClientEvent = serde_json::from_str(&raw).unwrap();

        assert!(matches!(event, ClientEvent::Typing { display_name, .. } if display_name == "Ann"));
    }

    #[test]
    fn test_parse_ping() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(event, ClientEvent::Ping);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"joinRoom"}"#).is_err());
    }
}
