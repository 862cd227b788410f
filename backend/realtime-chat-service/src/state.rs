use crypto_core::jwt::JwtKeys;
use std::sync::Arc;

use crate::{
    config::WsSettings,
    middleware::SessionAuthenticator,
    repository::ChatStore,
    services::{FriendService, MessageService, NotificationService, RoomService},
    websocket::{Broadcaster, ConnectionRegistry, LocalBroadcaster},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub registry: ConnectionRegistry,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub keys: Arc<JwtKeys>,
    pub authenticator: SessionAuthenticator,
    pub rooms: RoomService,
    pub messages: MessageService,
    pub friends: FriendService,
    pub notifications: NotificationService,
    pub ws: WsSettings,
}

impl AppState {
    /// Wires the services over one store and this process' registry
    pub fn new(store: Arc<dyn ChatStore>, keys: Arc<JwtKeys>, ws: WsSettings) -> Self {
        let registry = ConnectionRegistry::new();
        let broadcaster: Arc<dyn Broadcaster> = Arc::new(LocalBroadcaster::new(registry.clone()));

        let notifications = NotificationService::new(store.clone(), broadcaster.clone());
        let messages =
            MessageService::new(store.clone(), broadcaster.clone(), notifications.clone());
        let friends = FriendService::new(
            store.clone(),
            registry.clone(),
            broadcaster.clone(),
            notifications.clone(),
        );
        let rooms = RoomService::new(store.clone(), registry.clone());
        let authenticator = SessionAuthenticator::new(keys.clone(), store.clone());

        Self {
            store,
            registry,
            broadcaster,
            keys,
            authenticator,
            rooms,
            messages,
            friends,
            notifications,
            ws,
        }
    }
}
