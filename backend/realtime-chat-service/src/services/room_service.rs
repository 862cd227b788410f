use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ChatRoom, RoomDetails};
use crate::repository::ChatStore;
use crate::websocket::ConnectionRegistry;

#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn ChatStore>,
    registry: ConnectionRegistry,
}

impl RoomService {
    pub fn new(store: Arc<dyn ChatStore>, registry: ConnectionRegistry) -> Self {
        Self { store, registry }
    }

    /// Creates a group room and joins the participants' live sessions to it
    pub async fn create_group_room(
        &self,
        name: &str,
        participant_ids: &[Uuid],
    ) -> AppResult<ChatRoom> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("room name must not be blank".into()));
        }

        let mut ids: Vec<Uuid> = Vec::with_capacity(participant_ids.len());
        for id in participant_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one participant is required".into(),
            ));
        }

        let found = self.store.find_user_summaries(&ids).await?;
        let missing: Vec<Uuid> = ids
            .iter()
            .copied()
            .filter(|id| !found.iter().any(|u| u.id == *id))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::ParticipantNotFound(missing));
        }

        let room = self.store.create_group_room(name, &ids).await?;
        for user_id in &room.participant_ids {
            self.registry.join_room(*user_id, room.id).await;
        }

        tracing::info!(room_id = %room.id, participants = room.participant_ids.len(), "group room created");
        Ok(room)
    }

    /// Newest first
    pub async fn rooms_for_user(&self, user_id: Uuid) -> AppResult<Vec<RoomDetails>> {
        self.store.rooms_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryChatStore;
    use crate::websocket::SessionId;

    fn service(store: &MemoryChatStore, registry: &ConnectionRegistry) -> RoomService {
        RoomService::new(Arc::new(store.clone()), registry.clone())
    }

    #[tokio::test]
    async fn test_create_deduplicates_and_joins_live_sessions() {
        let store = MemoryChatStore::new();
        let registry = ConnectionRegistry::new();
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let bob = store.insert_user("Bob", "bob@example.com").await;
        let session = SessionId::new();
        let _rx = registry.register(bob.id, session, []).await;

        let room = service(&store, &registry)
            .create_group_room("general", &[ann.id, bob.id, ann.id])
            .await
            .unwrap();

        assert_eq!(room.participant_ids, vec![ann.id, bob.id]);
        assert!(registry.is_in_room(session, room.id).await);
    }

    #[tokio::test]
    async fn test_unknown_participants_are_listed() {
        let store = MemoryChatStore::new();
        let registry = ConnectionRegistry::new();
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let ghost = Uuid::new_v4();

        let err = service(&store, &registry)
            .create_group_room("general", &[ann.id, ghost])
            .await
            .unwrap_err();

        assert_eq!(err, AppError::ParticipantNotFound(vec![ghost]));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let store = MemoryChatStore::new();
        let registry = ConnectionRegistry::new();
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let rooms = service(&store, &registry);

        assert!(matches!(
            rooms.create_group_room("  ", &[ann.id]).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            rooms.create_group_room("general", &[]).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_name_and_listing_order() {
        let store = MemoryChatStore::new();
        let registry = ConnectionRegistry::new();
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let rooms = service(&store, &registry);

        rooms.create_group_room("first", &[ann.id]).await.unwrap();
        rooms.create_group_room("second", &[ann.id]).await.unwrap();
        let err = rooms.create_group_room("first", &[ann.id]).await.unwrap_err();
        assert_eq!(err, AppError::RoomNameTaken);

        let listed = rooms.rooms_for_user(ann.id).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
        assert_eq!(listed[0].participants[0].name, "Ann");
    }
}
