use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    FriendRepository, MessageRepository, NotificationRepository, RoomRepository, UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    direct_pair, direct_room_name, ChatMessage, ChatRoom, Friend, FriendStatus, NewMessage,
    NewNotification, Notification, ReceivedRequest, RoomDetails, RoomType, User, UserSummary,
};

struct StoredRoom {
    room: ChatRoom,
    direct_pair: Option<(Uuid, Uuid)>,
}

struct StoredMessage {
    id: Uuid,
    chat_room_id: Uuid,
    sender_id: Uuid,
    content: String,
    images_url: Vec<String>,
    file_url: Option<String>,
    is_deleted: bool,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

struct StoredNotification {
    id: Uuid,
    receiver_id: Uuid,
    sender_id: Option<Uuid>,
    notification: NewNotification,
    is_read: bool,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    // insertion order doubles as creation order
    rooms: Vec<StoredRoom>,
    messages: Vec<StoredMessage>,
    friends: Vec<Friend>,
    notifications: Vec<StoredNotification>,
}

impl State {
    fn summary(&self, user_id: Uuid) -> Option<UserSummary> {
        self.users.get(&user_id).map(UserSummary::from)
    }

    fn room(&self, room_id: Uuid) -> Option<&StoredRoom> {
        self.rooms.iter().find(|r| r.room.id == room_id)
    }

    fn edge_index(&self, a: Uuid, b: Uuid) -> Option<usize> {
        let pair = direct_pair(a, b);
        self.friends
            .iter()
            .position(|f| direct_pair(f.requester_id, f.receiver_id) == pair)
    }

    fn message(&self, stored: &StoredMessage) -> AppResult<ChatMessage> {
        let sender = self.summary(stored.sender_id).ok_or(AppError::SenderNotFound)?;
        Ok(ChatMessage {
            id: stored.id,
            chat_room_id: stored.chat_room_id,
            content: stored.content.clone(),
            images_url: stored.images_url.clone(),
            file_url: stored.file_url.clone(),
            is_deleted: stored.is_deleted,
            sender,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    fn notification(&self, stored: &StoredNotification) -> Notification {
        Notification {
            id: stored.id,
            receiver_id: stored.receiver_id,
            sender: stored.sender_id.and_then(|id| self.summary(id)),
            notification_type: stored.notification.notification_type,
            message: stored.notification.message.clone(),
            chat_room_id: stored.notification.chat_room_id,
            is_read: stored.is_read,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn direct_room(&mut self, requester_id: Uuid, receiver_id: Uuid) -> AppResult<ChatRoom> {
        let pair = direct_pair(requester_id, receiver_id);
        if let Some(existing) = self.rooms.iter().find(|r| r.direct_pair == Some(pair)) {
            return Ok(existing.room.clone());
        }

        let requester = self.users.get(&requester_id).ok_or(AppError::UserNotFound)?;
        let receiver = self.users.get(&receiver_id).ok_or(AppError::UserNotFound)?;
        let now = Utc::now();
        let room = ChatRoom {
            id: Uuid::new_v4(),
            name: direct_room_name(&requester.name, &receiver.name),
            room_type: RoomType::Direct,
            participant_ids: vec![requester_id, receiver_id],
            created_at: now,
            updated_at: now,
        };
        self.rooms.push(StoredRoom {
            room: room.clone(),
            direct_pair: Some(pair),
        });
        Ok(room)
    }
}

/// In-process chat store with the same uniqueness rules as the database.
///
/// Every operation takes the state lock once, so the check-then-write steps
/// of an operation are atomic with respect to each other.
#[derive(Clone, Default)]
pub struct MemoryChatStore {
    state: Arc<RwLock<State>>,
    fail_notifications: Arc<AtomicBool>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user; account management lives outside this service
    pub async fn insert_user(&self, name: &str, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            profile_image_url: None,
            profile_description: None,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.users.insert(user.id, user.clone());
        user
    }

    /// Makes every notification write fail with a database error
    pub fn fail_notification_writes(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    pub async fn friend_edge_count(&self) -> usize {
        self.state.read().await.friends.len()
    }

    pub async fn direct_room_count(&self) -> usize {
        self.state
            .read()
            .await
            .rooms
            .iter()
            .filter(|r| r.direct_pair.is_some())
            .count()
    }
}

#[async_trait]
impl UserRepository for MemoryChatStore {
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_summaries(&self, user_ids: &[Uuid]) -> AppResult<Vec<UserSummary>> {
        let state = self.state.read().await;
        Ok(user_ids.iter().filter_map(|id| state.summary(*id)).collect())
    }

    async fn room_ids_for_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .iter()
            .filter(|r| r.room.has_participant(user_id))
            .map(|r| r.room.id)
            .collect())
    }
}

#[async_trait]
impl RoomRepository for MemoryChatStore {
    async fn create_group_room(&self, name: &str, participant_ids: &[Uuid]) -> AppResult<ChatRoom> {
        let mut state = self.state.write().await;
        let taken = state
            .rooms
            .iter()
            .any(|r| r.room.room_type == RoomType::Group && r.room.name == name);
        if taken {
            return Err(AppError::RoomNameTaken);
        }
        if let Some(missing) = participant_ids.iter().find(|id| !state.users.contains_key(*id)) {
            return Err(AppError::Database(format!(
                "participant {missing} violates chat_room_participants_user_id_fkey"
            )));
        }

        let mut ids: Vec<Uuid> = Vec::with_capacity(participant_ids.len());
        for id in participant_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }

        let now = Utc::now();
        let room = ChatRoom {
            id: Uuid::new_v4(),
            name: name.to_string(),
            room_type: RoomType::Group,
            participant_ids: ids,
            created_at: now,
            updated_at: now,
        };
        state.rooms.push(StoredRoom {
            room: room.clone(),
            direct_pair: None,
        });
        Ok(room)
    }

    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<ChatRoom>> {
        Ok(self.state.read().await.room(room_id).map(|r| r.room.clone()))
    }

    async fn rooms_for_user(&self, user_id: Uuid) -> AppResult<Vec<RoomDetails>> {
        let state = self.state.read().await;
        Ok(state
            .rooms
            .iter()
            .rev()
            .filter(|r| r.room.has_participant(user_id))
            .map(|r| RoomDetails {
                id: r.room.id,
                name: r.room.name.clone(),
                room_type: r.room.room_type,
                participants: r
                    .room
                    .participant_ids
                    .iter()
                    .filter_map(|id| state.summary(*id))
                    .collect(),
                created_at: r.room.created_at,
                updated_at: r.room.updated_at,
            })
            .collect())
    }

    async fn get_or_create_direct_room(
        &self,
        requester_id: Uuid,
        receiver_id: Uuid,
    ) -> AppResult<ChatRoom> {
        self.state.write().await.direct_room(requester_id, receiver_id)
    }
}

#[async_trait]
impl MessageRepository for MemoryChatStore {
    async fn insert_message(&self, message: &NewMessage) -> AppResult<Uuid> {
        let mut state = self.state.write().await;
        if state.room(message.chat_room_id).is_none() {
            return Err(AppError::Database(
                "chat_messages_chat_room_id_fkey violated".to_string(),
            ));
        }
        if !state.users.contains_key(&message.sender_id) {
            return Err(AppError::Database(
                "chat_messages_sender_id_fkey violated".to_string(),
            ));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        state.messages.push(StoredMessage {
            id,
            chat_room_id: message.chat_room_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            images_url: message.images_url.clone(),
            file_url: message.file_url.clone(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn find_message(&self, message_id: Uuid) -> AppResult<Option<ChatMessage>> {
        let state = self.state.read().await;
        state
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| state.message(m))
            .transpose()
    }

    async fn messages_for_room(&self, room_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        let state = self.state.read().await;
        state
            .messages
            .iter()
            .filter(|m| m.chat_room_id == room_id)
            .map(|m| state.message(m))
            .collect()
    }

    async fn mark_message_deleted(&self, message_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.is_deleted = true;
                message.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl FriendRepository for MemoryChatStore {
    async fn find_request(&self, request_id: Uuid) -> AppResult<Option<Friend>> {
        let state = self.state.read().await;
        Ok(state.friends.iter().find(|f| f.id == request_id).cloned())
    }

    async fn find_edge_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Friend>> {
        let state = self.state.read().await;
        Ok(state.edge_index(a, b).map(|i| state.friends[i].clone()))
    }

    async fn insert_pending_request(
        &self,
        requester_id: Uuid,
        receiver_id: Uuid,
    ) -> AppResult<Friend> {
        let mut state = self.state.write().await;
        if state.edge_index(requester_id, receiver_id).is_some() {
            return Err(AppError::RequestAlreadyPending);
        }

        let now = Utc::now();
        let friend = Friend {
            id: Uuid::new_v4(),
            requester_id,
            receiver_id,
            status: FriendStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.friends.push(friend.clone());
        Ok(friend)
    }

    async fn accept_request(&self, request_id: Uuid) -> AppResult<(Friend, ChatRoom)> {
        let mut state = self.state.write().await;
        let index = state
            .friends
            .iter()
            .position(|f| f.id == request_id)
            .ok_or(AppError::RequestNotFound)?;
        if state.friends[index].status != FriendStatus::Pending {
            return Err(AppError::NotPending);
        }

        // the room is resolved first so a failure leaves the edge untouched
        let (requester_id, receiver_id) = {
            let edge = &state.friends[index];
            (edge.requester_id, edge.receiver_id)
        };
        let room = state.direct_room(requester_id, receiver_id)?;

        let edge = &mut state.friends[index];
        edge.status = FriendStatus::Accepted;
        edge.updated_at = Utc::now();
        Ok((edge.clone(), room))
    }

    async fn delete_pending_request(&self, request_id: Uuid) -> AppResult<Option<Friend>> {
        let mut state = self.state.write().await;
        let position = state
            .friends
            .iter()
            .position(|f| f.id == request_id && f.status == FriendStatus::Pending);
        Ok(position.map(|i| state.friends.remove(i)))
    }

    async fn block(&self, requester_id: Uuid, blocked_id: Uuid) -> AppResult<Friend> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        match state.edge_index(requester_id, blocked_id) {
            Some(i) => {
                let edge = &mut state.friends[i];
                edge.requester_id = requester_id;
                edge.receiver_id = blocked_id;
                edge.status = FriendStatus::Blocked;
                edge.updated_at = now;
                Ok(edge.clone())
            }
            None => {
                let friend = Friend {
                    id: Uuid::new_v4(),
                    requester_id,
                    receiver_id: blocked_id,
                    status: FriendStatus::Blocked,
                    created_at: now,
                    updated_at: now,
                };
                state.friends.push(friend.clone());
                Ok(friend)
            }
        }
    }

    async fn accepted_friends(&self, user_id: Uuid) -> AppResult<Vec<UserSummary>> {
        let state = self.state.read().await;
        let mut friends: Vec<UserSummary> = state
            .friends
            .iter()
            .filter(|f| f.status == FriendStatus::Accepted && f.involves(user_id))
            .filter_map(|f| state.summary(f.other_side(user_id)))
            .collect();
        friends.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(friends)
    }

    async fn received_requests(&self, user_id: Uuid) -> AppResult<Vec<ReceivedRequest>> {
        let state = self.state.read().await;
        Ok(state
            .friends
            .iter()
            .rev()
            .filter(|f| f.receiver_id == user_id && f.status == FriendStatus::Pending)
            .filter_map(|f| {
                state.summary(f.requester_id).map(|requester| ReceivedRequest {
                    id: f.id,
                    status: f.status,
                    requester,
                    created_at: f.created_at,
                })
            })
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryChatStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> AppResult<Notification> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(AppError::Database("notification write disabled".to_string()));
        }

        let mut state = self.state.write().await;
        if !state.users.contains_key(&notification.receiver_id) {
            return Err(AppError::Database(
                "notifications_receiver_id_fkey violated".to_string(),
            ));
        }

        let now = Utc::now();
        let stored = StoredNotification {
            id: Uuid::new_v4(),
            receiver_id: notification.receiver_id,
            sender_id: notification.sender_id,
            notification: notification.clone(),
            is_read: false,
            created_at: now,
            updated_at: now,
        };
        let created = state.notification(&stored);
        state.notifications.push(stored);
        Ok(created)
    }

    async fn notifications_for_user(&self, user_id: Uuid) -> AppResult<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.receiver_id == user_id)
            .map(|n| state.notification(n))
            .collect())
    }

    async fn find_notification(&self, notification_id: Uuid) -> AppResult<Option<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .find(|n| n.id == notification_id)
            .map(|n| state.notification(n)))
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
    ) -> AppResult<Option<Notification>> {
        let mut state = self.state.write().await;
        let Some(index) = state.notifications.iter().position(|n| n.id == notification_id) else {
            return Ok(None);
        };

        let stored = &mut state.notifications[index];
        if !stored.is_read {
            stored.is_read = true;
            stored.updated_at = Utc::now();
        }
        Ok(Some(state.notification(&state.notifications[index])))
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut updated = 0;
        for stored in state
            .notifications
            .iter_mut()
            .filter(|n| n.receiver_id == user_id && !n.is_read)
        {
            stored.is_read = true;
            stored.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }
}
