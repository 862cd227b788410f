use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    FriendRepository, MessageRepository, NotificationRepository, RoomRepository, UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    direct_pair, direct_room_name, ChatMessage, ChatRoom, Friend, FriendStatus, MessageRow,
    NewMessage, NewNotification, Notification, NotificationRow, ReceivedRequest, RoomDetails,
    RoomType, User, UserSummary,
};

/// PostgreSQL implementation of the chat store
#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct RoomHeaderRow {
    id: Uuid,
    name: String,
    room_type: RoomType,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    chat_room_id: Uuid,
    id: Uuid,
    name: String,
    profile_image_url: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ReceivedRequestRow {
    id: Uuid,
    status: FriendStatus,
    created_at: DateTime<Utc>,
    requester_id: Uuid,
    requester_name: String,
    requester_profile_image_url: Option<String>,
}

async fn fetch_room<'e, E>(executor: E, room_id: Uuid) -> Result<Option<ChatRoom>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ChatRoom>(
        r#"
        SELECT r.id, r.name, r.room_type, r.created_at, r.updated_at,
               COALESCE(
                   ARRAY_AGG(p.user_id ORDER BY p.joined_at, p.user_id)
                       FILTER (WHERE p.user_id IS NOT NULL),
                   '{}'
               ) AS participant_ids
        FROM chat_rooms r
        LEFT JOIN chat_room_participants p ON p.chat_room_id = r.id
        WHERE r.id = $1
        GROUP BY r.id
        "#,
    )
    .bind(room_id)
    .fetch_optional(executor)
    .await
}

/// Get-or-create of a direct room on an open connection or transaction.
///
/// Relies on `chat_rooms_direct_pair_key`: the insert does nothing when the
/// pair already has a room and the re-read returns the winner.
async fn direct_room_in(
    conn: &mut PgConnection,
    requester_id: Uuid,
    receiver_id: Uuid,
) -> AppResult<ChatRoom> {
    let (low, high) = direct_pair(requester_id, receiver_id);

    let existing: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM chat_rooms
        WHERE room_type = 'DIRECT' AND direct_user_low = $1 AND direct_user_high = $2
        "#,
    )
    .bind(low)
    .bind(high)
    .fetch_optional(&mut *conn)
    .await?;

    let room_id = match existing {
        Some(id) => id,
        None => {
            let names: Vec<(Uuid, String)> =
                sqlx::query_as("SELECT id, name FROM users WHERE id = ANY($1)")
                    .bind(&[requester_id, receiver_id][..])
                    .fetch_all(&mut *conn)
                    .await?;
            let name_of = |user_id: Uuid| {
                names
                    .iter()
                    .find(|(id, _)| *id == user_id)
                    .map(|(_, name)| name.clone())
                    .ok_or(AppError::UserNotFound)
            };
            let name = direct_room_name(&name_of(requester_id)?, &name_of(receiver_id)?);

            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO chat_rooms (id, name, room_type, direct_user_low, direct_user_high)
                VALUES ($1, $2, 'DIRECT', $3, $4)
                ON CONFLICT (direct_user_low, direct_user_high) WHERE room_type = 'DIRECT'
                DO NOTHING
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&name)
            .bind(low)
            .bind(high)
            .fetch_optional(&mut *conn)
            .await?;

            match inserted {
                Some(id) => {
                    sqlx::query(
                        r#"
                        INSERT INTO chat_room_participants (chat_room_id, user_id)
                        VALUES ($1, $2), ($1, $3)
                        ON CONFLICT DO NOTHING
                        "#,
                    )
                    .bind(id)
                    .bind(requester_id)
                    .bind(receiver_id)
                    .execute(&mut *conn)
                    .await?;
                    id
                }
                None => {
                    sqlx::query_scalar(
                        r#"
                        SELECT id FROM chat_rooms
                        WHERE room_type = 'DIRECT'
                          AND direct_user_low = $1 AND direct_user_high = $2
                        "#,
                    )
                    .bind(low)
                    .bind(high)
                    .fetch_one(&mut *conn)
                    .await?
                }
            }
        }
    };

    fetch_room(&mut *conn, room_id)
        .await?
        .ok_or_else(|| AppError::Database(format!("direct room {room_id} vanished")))
}

#[async_trait]
impl UserRepository for PgChatStore {
    async fn find_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, profile_image_url, profile_description, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_summaries(&self, user_ids: &[Uuid]) -> AppResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, name, profile_image_url FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn room_ids_for_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT chat_room_id FROM chat_room_participants WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl RoomRepository for PgChatStore {
    async fn create_group_room(&self, name: &str, participant_ids: &[Uuid]) -> AppResult<ChatRoom> {
        let room_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO chat_rooms (id, name, room_type) VALUES ($1, $2, 'GROUP')")
            .bind(room_id)
            .bind(name)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO chat_room_participants (chat_room_id, user_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(participant_ids)
        .execute(&mut *tx)
        .await?;

        let room = fetch_room(&mut *tx, room_id)
            .await?
            .ok_or_else(|| AppError::Database(format!("room {room_id} missing after insert")))?;

        tx.commit().await?;
        Ok(room)
    }

    async fn find_room(&self, room_id: Uuid) -> AppResult<Option<ChatRoom>> {
        Ok(fetch_room(&self.pool, room_id).await?)
    }

    async fn rooms_for_user(&self, user_id: Uuid) -> AppResult<Vec<RoomDetails>> {
        let headers = sqlx::query_as::<_, RoomHeaderRow>(
            r#"
            SELECT r.id, r.name, r.room_type, r.created_at, r.updated_at
            FROM chat_rooms r
            JOIN chat_room_participants p ON p.chat_room_id = r.id
            WHERE p.user_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let room_ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let participants = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT p.chat_room_id, u.id, u.name, u.profile_image_url
            FROM chat_room_participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.chat_room_id = ANY($1)
            ORDER BY p.joined_at, u.id
            "#,
        )
        .bind(&room_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_room: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for row in participants {
            by_room.entry(row.chat_room_id).or_default().push(UserSummary {
                id: row.id,
                name: row.name,
                profile_image_url: row.profile_image_url,
            });
        }

        Ok(headers
            .into_iter()
            .map(|h| RoomDetails {
                participants: by_room.remove(&h.id).unwrap_or_default(),
                id: h.id,
                name: h.name,
                room_type: h.room_type,
                created_at: h.created_at,
                updated_at: h.updated_at,
            })
            .collect())
    }

    async fn get_or_create_direct_room(
        &self,
        requester_id: Uuid,
        receiver_id: Uuid,
    ) -> AppResult<ChatRoom> {
        let mut tx = self.pool.begin().await?;
        let room = direct_room_in(&mut tx, requester_id, receiver_id).await?;
        tx.commit().await?;
        Ok(room)
    }
}

#[async_trait]
impl MessageRepository for PgChatStore {
    async fn insert_message(&self, message: &NewMessage) -> AppResult<Uuid> {
        let message_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, chat_room_id, sender_id, content, images_url, file_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message_id)
        .bind(message.chat_room_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(&message.images_url)
        .bind(&message.file_url)
        .execute(&self.pool)
        .await?;

        Ok(message_id)
    }

    async fn find_message(&self, message_id: Uuid) -> AppResult<Option<ChatMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.chat_room_id, m.content, m.images_url, m.file_url, m.is_deleted,
                   m.sender_id, u.name AS sender_name,
                   u.profile_image_url AS sender_profile_image_url,
                   m.created_at, m.updated_at
            FROM chat_messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChatMessage::from))
    }

    async fn messages_for_room(&self, room_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.chat_room_id, m.content, m.images_url, m.file_url, m.is_deleted,
                   m.sender_id, u.name AS sender_name,
                   u.profile_image_url AS sender_profile_image_url,
                   m.created_at, m.updated_at
            FROM chat_messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.chat_room_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    async fn mark_message_deleted(&self, message_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE chat_messages SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl FriendRepository for PgChatStore {
    async fn find_request(&self, request_id: Uuid) -> AppResult<Option<Friend>> {
        let friend = sqlx::query_as::<_, Friend>(
            r#"
            SELECT id, requester_id, receiver_id, status, created_at, updated_at
            FROM friends
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(friend)
    }

    async fn find_edge_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Friend>> {
        let friend = sqlx::query_as::<_, Friend>(
            r#"
            SELECT id, requester_id, receiver_id, status, created_at, updated_at
            FROM friends
            WHERE (requester_id = $1 AND receiver_id = $2)
               OR (requester_id = $2 AND receiver_id = $1)
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(friend)
    }

    async fn insert_pending_request(
        &self,
        requester_id: Uuid,
        receiver_id: Uuid,
    ) -> AppResult<Friend> {
        // friends_pair_key turns a concurrent duplicate into RequestAlreadyPending
        let friend = sqlx::query_as::<_, Friend>(
            r#"
            INSERT INTO friends (id, requester_id, receiver_id, status)
            VALUES ($1, $2, $3, 'PENDING')
            RETURNING id, requester_id, receiver_id, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(requester_id)
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(friend)
    }

    async fn accept_request(&self, request_id: Uuid) -> AppResult<(Friend, ChatRoom)> {
        let mut tx = self.pool.begin().await?;

        let accepted = sqlx::query_as::<_, Friend>(
            r#"
            UPDATE friends
            SET status = 'ACCEPTED', updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING id, requester_id, receiver_id, status, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(friend) = accepted else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM friends WHERE id = $1)")
                    .bind(request_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                AppError::NotPending
            } else {
                AppError::RequestNotFound
            });
        };

        let room = direct_room_in(&mut tx, friend.requester_id, friend.receiver_id).await?;

        tx.commit().await?;
        Ok((friend, room))
    }

    async fn delete_pending_request(&self, request_id: Uuid) -> AppResult<Option<Friend>> {
        let friend = sqlx::query_as::<_, Friend>(
            r#"
            DELETE FROM friends
            WHERE id = $1 AND status = 'PENDING'
            RETURNING id, requester_id, receiver_id, status, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(friend)
    }

    async fn block(&self, requester_id: Uuid, blocked_id: Uuid) -> AppResult<Friend> {
        let friend = sqlx::query_as::<_, Friend>(
            r#"
            INSERT INTO friends (id, requester_id, receiver_id, status)
            VALUES ($1, $2, $3, 'BLOCKED')
            ON CONFLICT ((LEAST(requester_id, receiver_id)), (GREATEST(requester_id, receiver_id)))
            DO UPDATE SET requester_id = EXCLUDED.requester_id,
                          receiver_id = EXCLUDED.receiver_id,
                          status = 'BLOCKED',
                          updated_at = NOW()
            RETURNING id, requester_id, receiver_id, status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(requester_id)
        .bind(blocked_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(friend)
    }

    async fn accepted_friends(&self, user_id: Uuid) -> AppResult<Vec<UserSummary>> {
        let friends = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.name, u.profile_image_url
            FROM friends f
            JOIN users u
              ON u.id = CASE WHEN f.requester_id = $1 THEN f.receiver_id ELSE f.requester_id END
            WHERE (f.requester_id = $1 OR f.receiver_id = $1)
              AND f.status = 'ACCEPTED'
            ORDER BY u.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(friends)
    }

    async fn received_requests(&self, user_id: Uuid) -> AppResult<Vec<ReceivedRequest>> {
        let rows = sqlx::query_as::<_, ReceivedRequestRow>(
            r#"
            SELECT f.id, f.status, f.created_at,
                   u.id AS requester_id, u.name AS requester_name,
                   u.profile_image_url AS requester_profile_image_url
            FROM friends f
            JOIN users u ON u.id = f.requester_id
            WHERE f.receiver_id = $1 AND f.status = 'PENDING'
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ReceivedRequest {
                id: row.id,
                status: row.status,
                requester: UserSummary {
                    id: row.requester_id,
                    name: row.requester_name,
                    profile_image_url: row.requester_profile_image_url,
                },
                created_at: row.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for PgChatStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> AppResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            WITH inserted AS (
                INSERT INTO notifications
                    (id, receiver_id, sender_id, notification_type, message, chat_room_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT n.id, n.receiver_id, n.sender_id, s.name AS sender_name,
                   s.profile_image_url AS sender_profile_image_url,
                   n.notification_type, n.message, n.chat_room_id, n.is_read,
                   n.created_at, n.updated_at
            FROM inserted n
            LEFT JOIN users s ON s.id = n.sender_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.receiver_id)
        .bind(notification.sender_id)
        .bind(notification.notification_type)
        .bind(&notification.message)
        .bind(notification.chat_room_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn notifications_for_user(&self, user_id: Uuid) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT n.id, n.receiver_id, n.sender_id, s.name AS sender_name,
                   s.profile_image_url AS sender_profile_image_url,
                   n.notification_type, n.message, n.chat_room_id, n.is_read,
                   n.created_at, n.updated_at
            FROM notifications n
            LEFT JOIN users s ON s.id = n.sender_id
            WHERE n.receiver_id = $1
            ORDER BY n.created_at DESC, n.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn find_notification(&self, notification_id: Uuid) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT n.id, n.receiver_id, n.sender_id, s.name AS sender_name,
                   s.profile_image_url AS sender_profile_image_url,
                   n.notification_type, n.message, n.chat_room_id, n.is_read,
                   n.created_at, n.updated_at
            FROM notifications n
            LEFT JOIN users s ON s.id = n.sender_id
            WHERE n.id = $1
            "#,
        )
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Notification::from))
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
    ) -> AppResult<Option<Notification>> {
        // Re-marking keeps the original updated_at
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            WITH updated AS (
                UPDATE notifications
                SET is_read = TRUE,
                    updated_at = CASE WHEN is_read THEN updated_at ELSE NOW() END
                WHERE id = $1
                RETURNING *
            )
            SELECT n.id, n.receiver_id, n.sender_id, s.name AS sender_name,
                   s.profile_image_url AS sender_profile_image_url,
                   n.notification_type, n.message, n.chat_room_id, n.is_read,
                   n.created_at, n.updated_at
            FROM updated n
            LEFT JOIN users s ON s.id = n.sender_id
            "#,
        )
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Notification::from))
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, updated_at = NOW()
            WHERE receiver_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
