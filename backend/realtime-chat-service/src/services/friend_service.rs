use std::sync::Arc;
use uuid::Uuid;

use super::NotificationService;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    AcceptedFriendship, Friend, FriendStatus, NewNotification, NotificationType, ReceivedRequest,
    User, UserSummary,
};
use crate::repository::ChatStore;
use crate::websocket::{Broadcaster, ConnectionRegistry, ServerEvent};

/// Friend request state machine
///
/// (none) -> PENDING -> ACCEPTED | removed (decline) | BLOCKED, and
/// (none) -> BLOCKED. Storage uniqueness on the unordered pair is the
/// guarantee; the lookups here only pick the right error.
#[derive(Clone)]
pub struct FriendService {
    store: Arc<dyn ChatStore>,
    registry: ConnectionRegistry,
    broadcaster: Arc<dyn Broadcaster>,
    notifications: NotificationService,
}

fn existing_edge_error(status: FriendStatus) -> AppError {
    match status {
        FriendStatus::Pending => AppError::RequestAlreadyPending,
        FriendStatus::Accepted => AppError::AlreadyFriends,
        FriendStatus::Blocked => AppError::Blocked,
    }
}

impl FriendService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        registry: ConnectionRegistry,
        broadcaster: Arc<dyn Broadcaster>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            registry,
            broadcaster,
            notifications,
        }
    }

    async fn require_user(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn send_request(&self, requester_id: Uuid, receiver_id: Uuid) -> AppResult<Friend> {
        if requester_id == receiver_id {
            return Err(AppError::SelfRequest);
        }
        let requester = self.require_user(requester_id).await?;
        self.require_user(receiver_id).await?;

        if let Some(edge) = self.store.find_edge_between(requester_id, receiver_id).await? {
            return Err(existing_edge_error(edge.status));
        }

        let friend = match self
            .store
            .insert_pending_request(requester_id, receiver_id)
            .await
        {
            Ok(friend) => friend,
            // lost a race: report what the winner created
            Err(AppError::RequestAlreadyPending) => {
                let status = self
                    .store
                    .find_edge_between(requester_id, receiver_id)
                    .await?
                    .map(|edge| edge.status)
                    .unwrap_or(FriendStatus::Pending);
                return Err(existing_edge_error(status));
            }
            Err(e) => return Err(e),
        };
        metrics::friend_transition("requested");

        tracing::info!(
            request_id = %friend.id,
            %requester_id,
            %receiver_id,
            "friend request sent"
        );

        self.broadcaster
            .to_user(
                receiver_id,
                &ServerEvent::NewFriendRequest {
                    friend: friend.clone(),
                },
            )
            .await;

        self.notifications
            .create_best_effort(
                NewNotification::new(receiver_id, NotificationType::FriendRequestReceived)
                    .from_sender(requester_id)
                    .with_message(format!(
                        "You have a new friend request from {}",
                        requester.name
                    )),
            )
            .await;

        Ok(friend)
    }

    /// Only the receiver may accept. The transition and the direct room are
    /// committed together; the requester's notification follows the commit.
    pub async fn accept_request(
        &self,
        user_id: Uuid,
        request_id: Uuid,
    ) -> AppResult<AcceptedFriendship> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(AppError::RequestNotFound)?;
        if request.receiver_id != user_id {
            return Err(AppError::NotRequestReceiver);
        }
        if request.status != FriendStatus::Pending {
            return Err(AppError::NotPending);
        }

        let (friend, chat_room) = self.store.accept_request(request_id).await?;
        metrics::friend_transition("accepted");

        for participant in [friend.requester_id, friend.receiver_id] {
            self.registry.join_room(participant, chat_room.id).await;
        }

        tracing::info!(
            %request_id,
            room_id = %chat_room.id,
            requester_id = %friend.requester_id,
            receiver_id = %friend.receiver_id,
            "friend request accepted"
        );

        let receiver_name = self
            .store
            .find_user(friend.receiver_id)
            .await
            .ok()
            .flatten()
            .map(|u| u.name)
            .unwrap_or_else(|| "Someone".to_string());
        self.notifications
            .create_best_effort(
                NewNotification::new(friend.requester_id, NotificationType::FriendRequestAccepted)
                    .from_sender(friend.receiver_id)
                    .with_message(format!("{receiver_name} accepted your friend request"))
                    .in_room(chat_room.id),
            )
            .await;

        Ok(AcceptedFriendship { friend, chat_room })
    }

    /// Removes the pending edge, so the pair may request again later
    pub async fn decline_request(&self, user_id: Uuid, request_id: Uuid) -> AppResult<Friend> {
        let request = self
            .store
            .find_request(request_id)
            .await?
            .ok_or(AppError::RequestNotFound)?;
        if request.receiver_id != user_id {
            return Err(AppError::NotRequestReceiver);
        }
        if request.status != FriendStatus::Pending {
            return Err(AppError::NotPending);
        }

        let declined = self
            .store
            .delete_pending_request(request_id)
            .await?
            .ok_or(AppError::NotPending)?;
        metrics::friend_transition("declined");

        tracing::info!(%request_id, %user_id, "friend request declined");
        Ok(declined)
    }

    /// Overrides any edge of the pair; blocking a stranger creates one
    pub async fn block_user(&self, requester_id: Uuid, blocked_id: Uuid) -> AppResult<Friend> {
        if requester_id == blocked_id {
            return Err(AppError::SelfBlock);
        }
        self.require_user(blocked_id).await?;

        let friend = self.store.block(requester_id, blocked_id).await?;
        metrics::friend_transition("blocked");

        tracing::info!(%requester_id, %blocked_id, "user blocked");
        Ok(friend)
    }

    pub async fn get_friends(&self, user_id: Uuid) -> AppResult<Vec<UserSummary>> {
        self.store.accepted_friends(user_id).await
    }

    pub async fn get_received_requests(&self, user_id: Uuid) -> AppResult<Vec<ReceivedRequest>> {
        self.store.received_requests(user_id).await
    }
}
