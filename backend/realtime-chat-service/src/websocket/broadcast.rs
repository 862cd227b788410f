use async_trait::async_trait;
use uuid::Uuid;

use super::events::ServerEvent;
use super::registry::{ConnectionRegistry, SessionId};
use crate::metrics;

/// Push capability handed to services
///
/// Delivery is best-effort: an offline receiver is the normal case and
/// returns 0. A pub/sub backed implementation can fan out across processes
/// behind the same trait.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Every session joined to `room_id` except `except`
    async fn to_room(&self, room_id: Uuid, event: &ServerEvent, except: Option<SessionId>) -> usize;

    /// Every session of `user_id`
    async fn to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize;
}

/// Broadcaster over this process' registry
#[derive(Clone)]
pub struct LocalBroadcaster {
    registry: ConnectionRegistry,
}

impl LocalBroadcaster {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    fn encode(event: &ServerEvent) -> Option<String> {
        match event.to_payload() {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::error!(error = %e, event = event.event_type(), "failed to serialize event");
                None
            }
        }
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn to_room(&self, room_id: Uuid, event: &ServerEvent, except: Option<SessionId>) -> usize {
        let Some(payload) = Self::encode(event) else {
            return 0;
        };
        let delivered = self.registry.send_to_room(room_id, &payload, except).await;
        metrics::fanout_delivered(delivered);
        tracing::debug!(%room_id, event = event.event_type(), delivered, "room fan-out");
        delivered
    }

    async fn to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let Some(payload) = Self::encode(event) else {
            return 0;
        };
        let delivered = self.registry.send_to_user(user_id, &payload).await;
        metrics::fanout_delivered(delivered);
        tracing::debug!(%user_id, event = event.event_type(), delivered, "user fan-out");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_room_fanout_serializes_event() {
        let registry = ConnectionRegistry::new();
        let room_id = Uuid::new_v4();
        let mut rx = registry
            .register(Uuid::new_v4(), SessionId::new(), [room_id])
            .await;
        let broadcaster = LocalBroadcaster::new(registry);

        let message_id = Uuid::new_v4();
        let delivered = broadcaster
            .to_room(room_id, &ServerEvent::MessageDeleted { message_id }, None)
            .await;

        assert_eq!(delivered, 1);
        let payload: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(payload["messageId"], message_id.to_string());
    }

    #[tokio::test]
    async fn test_offline_user_is_not_an_error() {
        let broadcaster = LocalBroadcaster::new(ConnectionRegistry::new());
        assert_eq!(broadcaster.to_user(Uuid::new_v4(), &ServerEvent::Pong).await, 0);
    }
}
