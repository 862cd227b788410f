//! Persistence gateway
//!
//! Services depend on these traits only. `PgChatStore` is the production
//! implementation; `MemoryChatStore` keeps the same uniqueness rules in
//! process memory for tests and database-less runs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    ChatMessage, ChatRoom, Friend, NewMessage, NewNotification, Notification, ReceivedRequest,
    RoomDetails, User, UserSummary,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Summaries for the ids that exist; unknown ids are skipped
    async fn find_user_summaries(&self, user_ids: &[Uuid]) -> AppResult<Vec<UserSummary>>;

    /// Rooms the user participates in
    async fn room_ids_for_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Fails `RoomNameTaken` when another group room already uses `name`
    async fn create_group_room(&self, name: &str, participant_ids: &[Uuid]) -> AppResult<ChatRoom>;

    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<ChatRoom>>;

    /// Newest first
    async fn rooms_for_user(&self, user_id: Uuid) -> AppResult<Vec<RoomDetails>>;

    /// Returns the direct room of the unordered pair, creating it if needed.
    /// Concurrent callers for the same pair always get the same room.
    async fn get_or_create_direct_room(&self, requester_id: Uuid, receiver_id: Uuid)
        -> AppResult<ChatRoom>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert_message(&self, message: &NewMessage) -> AppResult<Uuid>;

    /// Message joined with its sender projection
    async fn find_message(&self, message_id: Uuid) -> AppResult<Option<ChatMessage>>;

    /// Oldest first, deleted messages included
    async fn messages_for_room(&self, room_id: Uuid) -> AppResult<Vec<ChatMessage>>;

    /// Returns false when the message does not exist
    async fn mark_message_deleted(&self, message_id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait FriendRepository: Send + Sync {
    async fn find_request(&self, request_id: Uuid) -> AppResult<Option<Friend>>;

    /// The edge between two users in either direction
    async fn find_edge_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Friend>>;

    /// Fails `RequestAlreadyPending` when any edge already exists for the pair
    async fn insert_pending_request(&self, requester_id: Uuid, receiver_id: Uuid)
        -> AppResult<Friend>;

    /// In one transaction: PENDING -> ACCEPTED and get-or-create the direct
    /// room. Fails `RequestNotFound` or `NotPending` without side effects.
    async fn accept_request(&self, request_id: Uuid) -> AppResult<(Friend, ChatRoom)>;

    /// Deletes the edge only while it is still PENDING
    async fn delete_pending_request(&self, request_id: Uuid) -> AppResult<Option<Friend>>;

    /// Overwrites any edge of the pair with a BLOCKED one oriented as given
    async fn block(&self, requester_id: Uuid, blocked_id: Uuid) -> AppResult<Friend>;

    async fn accepted_friends(&self, user_id: Uuid) -> AppResult<Vec<UserSummary>>;

    async fn received_requests(&self, user_id: Uuid) -> AppResult<Vec<ReceivedRequest>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: &NewNotification)
        -> AppResult<Notification>;

    /// Newest first
    async fn notifications_for_user(&self, user_id: Uuid) -> AppResult<Vec<Notification>>;

    async fn find_notification(&self, notification_id: Uuid) -> AppResult<Option<Notification>>;

    /// Returns `None` when the notification does not exist
    async fn mark_notification_read(&self, notification_id: Uuid)
        -> AppResult<Option<Notification>>;

    /// Number of notifications that flipped to read
    async fn mark_all_notifications_read(&self, user_id: Uuid) -> AppResult<u64>;
}

/// Everything the chat core persists
pub trait ChatStore:
    UserRepository + RoomRepository + MessageRepository + FriendRepository + NotificationRepository
{
}

impl<T> ChatStore for T where
    T: UserRepository
        + RoomRepository
        + MessageRepository
        + FriendRepository
        + NotificationRepository
{
}
