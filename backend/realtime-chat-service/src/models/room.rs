use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UserSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "chat_room_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    Direct,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub participant_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatRoom {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_ids.contains(&user_id)
    }

    /// Participants other than `user_id`, in stored order
    pub fn other_participants(&self, user_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.participant_ids
            .iter()
            .copied()
            .filter(move |id| *id != user_id)
    }
}

/// Room listing entry with participant projections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetails {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub participants: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical ordering of a direct-room pair, the storage uniqueness key
pub fn direct_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Display name of a direct room, built from both users' names
pub fn direct_room_name(requester_name: &str, receiver_name: &str) -> String {
    format!("{requester_name} & {receiver_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(direct_pair(a, b), direct_pair(b, a));
    }

    #[test]
    fn test_room_type_wire_format() {
        assert_eq!(serde_json::to_string(&RoomType::Direct).unwrap(), "\"DIRECT\"");
        assert_eq!(serde_json::to_string(&RoomType::Group).unwrap(), "\"GROUP\"");
    }

    #[test]
    fn test_other_participants_excludes_self() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let room = ChatRoom {
            id: Uuid::new_v4(),
            name: direct_room_name("Ann", "Bob"),
            room_type: RoomType::Direct,
            participant_ids: vec![me, other],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(room.name, "Ann & Bob");
        assert_eq!(room.other_participants(me).collect::<Vec<_>>(), vec![other]);
    }
}
