use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

use crate::metrics;

/// Unique identifier for one live WebSocket session
///
/// A user may hold several sessions at once (multiple devices or tabs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

struct Session {
    user_id: Uuid,
    rooms: HashSet<Uuid>,
    sender: UnboundedSender<String>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    by_user: HashMap<Uuid, HashSet<SessionId>>,
    by_room: HashMap<Uuid, HashSet<SessionId>>,
}

impl Inner {
    fn remove(&mut self, session_id: SessionId) -> bool {
        let Some(session) = self.sessions.remove(&session_id) else {
            return false;
        };

        if let Some(ids) = self.by_user.get_mut(&session.user_id) {
            ids.remove(&session_id);
            if ids.is_empty() {
                self.by_user.remove(&session.user_id);
            }
        }
        for room_id in &session.rooms {
            if let Some(ids) = self.by_room.get_mut(room_id) {
                ids.remove(&session_id);
                if ids.is_empty() {
                    self.by_room.remove(room_id);
                }
            }
        }
        true
    }

    fn prune(&mut self, dead: Vec<SessionId>) {
        if dead.is_empty() {
            return;
        }
        let mut pruned = 0;
        for session_id in dead {
            if self.remove(session_id) {
                metrics::session_closed();
                pruned += 1;
            }
        }
        tracing::debug!(pruned, "pruned dead websocket sessions");
    }

    /// Sends to each target, returning delivered count and dead sessions
    fn send_all<'a>(
        &self,
        targets: impl Iterator<Item = &'a SessionId>,
        payload: &str,
    ) -> (usize, Vec<SessionId>) {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for id in targets {
            if let Some(session) = self.sessions.get(id) {
                if session.sender.send(payload.to_string()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }
        (delivered, dead)
    }
}

/// Process-local map of live sessions, indexed by user and by room
///
/// Sessions receive pre-serialized events through the channel handed out by
/// `register`. Dropping the receiver marks the session dead; it is pruned on
/// the next delivery attempt or on `unregister`.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session for `user_id`, joined to its private channel and
    /// to every room in `rooms`.
    pub async fn register(
        &self,
        user_id: Uuid,
        session_id: SessionId,
        rooms: impl IntoIterator<Item = Uuid>,
    ) -> UnboundedReceiver<String> {
        let (tx, rx) = unbounded_channel();
        let rooms: HashSet<Uuid> = rooms.into_iter().collect();

        let mut guard = self.inner.write().await;
        // re-registering an id replaces the previous session
        if guard.remove(session_id) {
            metrics::session_closed();
        }
        for room_id in &rooms {
            guard.by_room.entry(*room_id).or_default().insert(session_id);
        }
        guard.by_user.entry(user_id).or_default().insert(session_id);
        let room_count = rooms.len();
        guard.sessions.insert(
            session_id,
            Session {
                user_id,
                rooms,
                sender: tx,
            },
        );
        metrics::session_opened();

        tracing::debug!(
            %session_id,
            %user_id,
            rooms = room_count,
            total_sessions = guard.sessions.len(),
            "registered websocket session"
        );

        rx
    }

    /// Removes the session from every index. Returns false when it was
    /// already gone, so repeated calls are harmless.
    pub async fn unregister(&self, session_id: SessionId) -> bool {
        let mut guard = self.inner.write().await;
        let removed = guard.remove(session_id);
        if removed {
            metrics::session_closed();
            tracing::debug!(
                %session_id,
                remaining = guard.sessions.len(),
                "unregistered websocket session"
            );
        }
        removed
    }

    pub async fn sessions_for_user(&self, user_id: Uuid) -> Vec<SessionId> {
        let guard = self.inner.read().await;
        guard
            .by_user
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn sessions_for_room(&self, room_id: Uuid) -> Vec<SessionId> {
        let guard = self.inner.read().await;
        guard
            .by_room
            .get(&room_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Joins every live session of `user_id` to `room_id`. Returns how many
    /// sessions were joined.
    pub async fn join_room(&self, user_id: Uuid, room_id: Uuid) -> usize {
        let mut guard = self.inner.write().await;
        let session_ids: Vec<SessionId> = guard
            .by_user
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        for session_id in &session_ids {
            if let Some(session) = guard.sessions.get_mut(session_id) {
                session.rooms.insert(room_id);
            }
            guard.by_room.entry(room_id).or_default().insert(*session_id);
        }

        if !session_ids.is_empty() {
            tracing::debug!(%user_id, %room_id, sessions = session_ids.len(), "joined live sessions to room");
        }
        session_ids.len()
    }

    pub async fn is_in_room(&self, session_id: SessionId, room_id: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard
            .sessions
            .get(&session_id)
            .map(|s| s.rooms.contains(&room_id))
            .unwrap_or(false)
    }

    /// Delivers to every session in the room except `except`
    ///
    /// Dispatch holds the write lock so every session sees concurrent
    /// fan-outs in the same order.
    pub async fn send_to_room(
        &self,
        room_id: Uuid,
        payload: &str,
        except: Option<SessionId>,
    ) -> usize {
        let mut guard = self.inner.write().await;
        let (delivered, dead) = match guard.by_room.get(&room_id) {
            Some(ids) => guard.send_all(ids.iter().filter(|id| Some(**id) != except), payload),
            None => (0, Vec::new()),
        };
        guard.prune(dead);
        delivered
    }

    pub async fn send_to_user(&self, user_id: Uuid, payload: &str) -> usize {
        let mut guard = self.inner.write().await;
        let (delivered, dead) = match guard.by_user.get(&user_id) {
            Some(ids) => guard.send_all(ids.iter(), payload),
            None => (0, Vec::new()),
        };
        guard.prune(dead);
        delivered
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_indexes_user_and_rooms() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        let session = SessionId::new();

        let _rx = registry.register(user, session, [room]).await;

        assert_eq!(registry.sessions_for_user(user).await, vec![session]);
        assert_eq!(registry.sessions_for_room(room).await, vec![session]);
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        let session = SessionId::new();
        let _rx = registry.register(user, session, [room]).await;

        assert!(registry.unregister(session).await);
        assert!(!registry.unregister(session).await);
        assert!(registry.sessions_for_user(user).await.is_empty());
        assert!(registry.sessions_for_room(room).await.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_room_skips_excluded_session() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let a = SessionId::new();
        let b = SessionId::new();
        let mut rx_a = registry.register(Uuid::new_v4(), a, [room]).await;
        let mut rx_b = registry.register(Uuid::new_v4(), b, [room]).await;

        let delivered = registry.send_to_room(room, "hi", Some(a)).await;

        assert_eq!(delivered, 1);
        assert_eq!(rx_b.recv().await.as_deref(), Some("hi"));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multi_device_user_receives_on_every_session() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let mut phone = registry.register(user, SessionId::new(), []).await;
        let mut laptop = registry.register(user, SessionId::new(), []).await;

        assert_eq!(registry.send_to_user(user, "ping").await, 2);
        assert_eq!(phone.recv().await.as_deref(), Some("ping"));
        assert_eq!(laptop.recv().await.as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_join_room_reaches_connected_sessions() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        let session = SessionId::new();
        let mut rx = registry.register(user, session, []).await;

        assert_eq!(registry.join_room(user, room).await, 1);
        assert!(registry.is_in_room(session, room).await);

        registry.send_to_room(room, "welcome", None).await;
        assert_eq!(rx.recv().await.as_deref(), Some("welcome"));
    }

    #[tokio::test]
    async fn test_dead_sessions_are_pruned() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let rx = registry.register(Uuid::new_v4(), SessionId::new(), [room]).await;
        drop(rx);

        assert_eq!(registry.send_to_room(room, "gone", None).await, 0);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fanouts_arrive_in_one_order() {
        let registry = ConnectionRegistry::new();
        let room = Uuid::new_v4();
        let mut receivers = Vec::new();
        for _ in 0..200 {
            let rx = registry.register(Uuid::new_v4(), SessionId::new(), [room]).await;
            receivers.push(rx);
        }

        for round in 0..20 {
            let first = registry.clone();
            let second = registry.clone();
            let a = tokio::spawn(async move { first.send_to_room(room, "a", None).await });
            let b = tokio::spawn(async move { second.send_to_room(room, "b", None).await });
            assert_eq!(a.await.unwrap(), 200);
            assert_eq!(b.await.unwrap(), 200);

            let mut orders = HashSet::new();
            for rx in receivers.iter_mut() {
                let x = rx.recv().await.unwrap();
                let y = rx.recv().await.unwrap();
                orders.insert((x, y));
            }
            assert_eq!(orders.len(), 1, "round {round} interleaved");
        }
    }
}
