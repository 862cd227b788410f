use std::sync::Arc;
use uuid::Uuid;

use super::NotificationService;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{ChatMessage, ChatRoom, NewMessage, NewNotification, NotificationType};
use crate::repository::ChatStore;
use crate::websocket::{Broadcaster, ServerEvent, SessionId};

/// Messaging engine: persistence, room fan-out and typing relay
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn ChatStore>,
    broadcaster: Arc<dyn Broadcaster>,
    notifications: NotificationService,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        broadcaster: Arc<dyn Broadcaster>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            broadcaster,
            notifications,
        }
    }

    async fn room_for_participant(&self, room_id: Uuid, user_id: Uuid) -> AppResult<ChatRoom> {
        let room = self
            .store
            .find_room(room_id)
            .await?
            .ok_or(AppError::RoomNotFound)?;
        if !room.has_participant(user_id) {
            return Err(AppError::NotParticipant);
        }
        Ok(room)
    }

    /// Persists the message, pushes `message-created` to every session in
    /// the room (the sender's other devices included) and notifies the other
    /// participants. Only persistence failures fail the send.
    pub async fn send_message(&self, message: NewMessage) -> AppResult<ChatMessage> {
        let room = self
            .room_for_participant(message.chat_room_id, message.sender_id)
            .await?;
        message.validate()?;

        let message_id = self.store.insert_message(&message).await?;
        let created = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(AppError::MessageNotFound)?;
        metrics::message_sent();

        let delivered = self
            .broadcaster
            .to_room(
                room.id,
                &ServerEvent::MessageCreated {
                    message: created.clone(),
                },
                None,
            )
            .await;

        tracing::info!(
            message_id = %created.id,
            room_id = %room.id,
            user_id = %message.sender_id,
            delivered,
            "message sent"
        );

        for receiver_id in room.other_participants(message.sender_id) {
            self.notifications
                .create_best_effort(
                    NewNotification::new(receiver_id, NotificationType::NewMessage)
                        .from_sender(message.sender_id)
                        .with_message(format!("New message in {}", room.name))
                        .in_room(room.id),
                )
                .await;
        }

        Ok(created)
    }

    /// Soft-deletes a message owned by `user_id` and announces it to the room
    pub async fn delete_message(&self, user_id: Uuid, message_id: Uuid) -> AppResult<ChatMessage> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(AppError::MessageNotFound)?;
        if message.sender.id != user_id {
            return Err(AppError::NotMessageOwner);
        }

        if !self.store.mark_message_deleted(message_id).await? {
            return Err(AppError::MessageNotFound);
        }

        self.broadcaster
            .to_room(
                message.chat_room_id,
                &ServerEvent::MessageDeleted { message_id },
                None,
            )
            .await;

        tracing::info!(%message_id, %user_id, room_id = %message.chat_room_id, "message deleted");

        self.store
            .find_message(message_id)
            .await?
            .ok_or(AppError::MessageNotFound)
    }

    /// Oldest first
    pub async fn messages(&self, user_id: Uuid, room_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        self.room_for_participant(room_id, user_id).await?;
        self.store.messages_for_room(room_id).await
    }

    pub async fn message(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<ChatMessage> {
        self.room_for_participant(room_id, user_id).await?;
        self.store
            .find_message(message_id)
            .await?
            .filter(|m| m.chat_room_id == room_id)
            .ok_or(AppError::MessageNotFound)
    }

    /// Relays the sender's name to the room's other sessions. Nothing about
    /// who is typing is kept; receivers add or drop the name by `isTyping`.
    async fn relay_typing(
        &self,
        origin: SessionId,
        room_id: Uuid,
        display_name: String,
        is_typing: bool,
    ) -> usize {
        self.broadcaster
            .to_room(
                room_id,
                &ServerEvent::TypingUsersUpdated {
                    room_id,
                    display_names: vec![display_name],
                    is_typing,
                },
                Some(origin),
            )
            .await
    }

    pub async fn typing(&self, origin: SessionId, room_id: Uuid, display_name: String) -> usize {
        self.relay_typing(origin, room_id, display_name, true).await
    }

    pub async fn stop_typing(&self, origin: SessionId, room_id: Uuid, display_name: String) -> usize {
        self.relay_typing(origin, room_id, display_name, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryChatStore, RoomRepository};
    use crate::websocket::{ConnectionRegistry, LocalBroadcaster};

    struct Harness {
        store: MemoryChatStore,
        registry: ConnectionRegistry,
        messages: MessageService,
    }

    fn harness() -> Harness {
        let store = MemoryChatStore::new();
        let registry = ConnectionRegistry::new();
        let broadcaster: Arc<dyn Broadcaster> = Arc::new(LocalBroadcaster::new(registry.clone()));
        let shared: Arc<dyn ChatStore> = Arc::new(store.clone());
        let notifications = NotificationService::new(shared.clone(), broadcaster.clone());
        Harness {
            messages: MessageService::new(shared, broadcaster, notifications),
            store,
            registry,
        }
    }

    async fn next_event(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_send_reaches_room_and_notifies_other_participant() {
        let h = harness();
        let sender = h.store.insert_user("Carol", "carol@example.com").await;
        let peer = h.store.insert_user("Dan", "dan@example.com").await;
        let outsider = h.store.insert_user("Eve", "eve@example.com").await;
        let room = h
            .store
            .create_group_room("room-5", &[sender.id, peer.id])
            .await
            .unwrap();

        let mut peer_rx = h.registry.register(peer.id, SessionId::new(), [room.id]).await;
        let mut outsider_rx = h.registry.register(outsider.id, SessionId::new(), []).await;

        let sent = h
            .messages
            .send_message(NewMessage::text(room.id, sender.id, "hello"))
            .await
            .unwrap();

        let created = next_event(&mut peer_rx).await;
        assert_eq!(created["type"], "message-created");
        assert_eq!(created["message"]["id"], sent.id.to_string());
        assert_eq!(created["message"]["content"], "hello");
        assert_eq!(created["message"]["sender"]["id"], sender.id.to_string());

        let notified = next_event(&mut peer_rx).await;
        assert_eq!(notified["type"], "new-notification");
        assert_eq!(notified["notification"]["type"], "NEW_MESSAGE");
        assert_eq!(notified["notification"]["chatRoomId"], room.id.to_string());

        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sender_other_devices_receive_message() {
        let h = harness();
        let sender = h.store.insert_user("Carol", "carol@example.com").await;
        let room = h.store.create_group_room("solo", &[sender.id]).await.unwrap();
        let mut laptop = h.registry.register(sender.id, SessionId::new(), [room.id]).await;

        h.messages
            .send_message(NewMessage::text(room.id, sender.id, "sync"))
            .await
            .unwrap();

        assert_eq!(next_event(&mut laptop).await["type"], "message-created");
    }

    #[tokio::test]
    async fn test_non_participant_never_persists() {
        let h = harness();
        let member = h.store.insert_user("Carol", "carol@example.com").await;
        let outsider = h.store.insert_user("Eve", "eve@example.com").await;
        let room = h.store.create_group_room("private", &[member.id]).await.unwrap();
        let mut member_rx = h.registry.register(member.id, SessionId::new(), [room.id]).await;

        let err = h
            .messages
            .send_message(NewMessage::text(room.id, outsider.id, "let me in"))
            .await
            .unwrap_err();

        assert_eq!(err, AppError::NotParticipant);
        assert!(h.messages.messages(member.id, room.id).await.unwrap().is_empty());
        assert!(member_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_room_and_empty_message() {
        let h = harness();
        let sender = h.store.insert_user("Carol", "carol@example.com").await;
        let room = h.store.create_group_room("quiet", &[sender.id]).await.unwrap();

        let err = h
            .messages
            .send_message(NewMessage::text(Uuid::new_v4(), sender.id, "hi"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::RoomNotFound);

        let err = h
            .messages
            .send_message(NewMessage::text(room.id, sender.id, " "))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::EmptyMessage);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_send() {
        let h = harness();
        let sender = h.store.insert_user("Carol", "carol@example.com").await;
        let peer = h.store.insert_user("Dan", "dan@example.com").await;
        let room = h
            .store
            .create_group_room("flaky", &[sender.id, peer.id])
            .await
            .unwrap();
        let mut peer_rx = h.registry.register(peer.id, SessionId::new(), [room.id]).await;
        h.store.fail_notification_writes(true);

        let sent = h
            .messages
            .send_message(NewMessage::text(room.id, sender.id, "still here"))
            .await
            .unwrap();

        assert_eq!(next_event(&mut peer_rx).await["message"]["id"], sent.id.to_string());
        assert!(peer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_requires_owner_and_broadcasts_id() {
        let h = harness();
        let sender = h.store.insert_user("Carol", "carol@example.com").await;
        let peer = h.store.insert_user("Dan", "dan@example.com").await;
        let room = h
            .store
            .create_group_room("edits", &[sender.id, peer.id])
            .await
            .unwrap();
        let sent = h
            .messages
            .send_message(NewMessage::text(room.id, sender.id, "oops"))
            .await
            .unwrap();
        let mut peer_rx = h.registry.register(peer.id, SessionId::new(), [room.id]).await;

        let err = h.messages.delete_message(peer.id, sent.id).await.unwrap_err();
        assert_eq!(err, AppError::NotMessageOwner);

        let deleted = h.messages.delete_message(sender.id, sent.id).await.unwrap();
        assert!(deleted.is_deleted);

        let event = next_event(&mut peer_rx).await;
        assert_eq!(event["type"], "message-deleted");
        assert_eq!(event["messageId"], sent.id.to_string());

        let err = h
            .messages
            .delete_message(sender.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err, AppError::MessageNotFound);
    }

    #[tokio::test]
    async fn test_message_lookup_is_scoped_to_room() {
        let h = harness();
        let sender = h.store.insert_user("Carol", "carol@example.com").await;
        let first = h.store.create_group_room("one", &[sender.id]).await.unwrap();
        let second = h.store.create_group_room("two", &[sender.id]).await.unwrap();
        let sent = h
            .messages
            .send_message(NewMessage::text(first.id, sender.id, "here"))
            .await
            .unwrap();

        assert!(h.messages.message(sender.id, first.id, sent.id).await.is_ok());
        let err = h
            .messages
            .message(sender.id, second.id, sent.id)
            .await
            .unwrap_err();
        assert_eq!(err, AppError::MessageNotFound);
    }

    #[tokio::test]
    async fn test_typing_relay_skips_origin() {
        let h = harness();
        let room_id = Uuid::new_v4();
        let origin = SessionId::new();
        let mut origin_rx = h.registry.register(Uuid::new_v4(), origin, [room_id]).await;
        let mut peer_rx = h.registry.register(Uuid::new_v4(), SessionId::new(), [room_id]).await;

        assert_eq!(h.messages.typing(origin, room_id, "Ann".into()).await, 1);
        let event = next_event(&mut peer_rx).await;
        assert_eq!(event["type"], "typing-users-updated");
        assert_eq!(event["displayNames"], serde_json::json!(["Ann"]));
        assert_eq!(event["isTyping"], true);

        assert!(origin_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_typing_names_only_the_stopped_user() {
        let h = harness();
        let room_id = Uuid::new_v4();
        let ann = SessionId::new();
        let bob = SessionId::new();
        let _ann_rx = h.registry.register(Uuid::new_v4(), ann, [room_id]).await;
        let _bob_rx = h.registry.register(Uuid::new_v4(), bob, [room_id]).await;
        let mut watcher_rx = h.registry.register(Uuid::new_v4(), SessionId::new(), [room_id]).await;

        h.messages.typing(ann, room_id, "Ann".into()).await;
        h.messages.typing(bob, room_id, "Bob".into()).await;
        h.messages.stop_typing(ann, room_id, "Ann".into()).await;

        let mut typing = Vec::new();
        for _ in 0..3 {
            let event = next_event(&mut watcher_rx).await;
            let name = event["displayNames"][0].as_str().unwrap().to_string();
            if event["isTyping"] == true {
                typing.push(name);
            } else {
                typing.retain(|n| *n != name);
            }
        }
        assert_eq!(typing, vec!["Bob".to_string()]);
    }
}
