use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web_actors::ws;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use super::events::ServerEvent;
use super::message_types::ClientEvent;
use super::registry::SessionId;
use crate::error::{AppError, AppResult};
use crate::models::NewMessage;
use crate::state::AppState;

/// Pre-serialized event for this session's socket
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct Deliver(pub String);

/// One authenticated WebSocket connection
///
/// Registration happens before the actor starts; `stopped` unregisters.
pub struct WsSession {
    session_id: SessionId,
    user_id: Uuid,
    state: AppState,
    hb: Instant,
}

impl WsSession {
    pub fn new(session_id: SessionId, user_id: Uuid, state: AppState) -> Self {
        Self {
            session_id,
            user_id,
            state,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let interval = self.state.ws.heartbeat_interval;
        let timeout = self.state.ws.client_timeout;
        ctx.run_interval(interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > timeout {
                tracing::warn!(session_id = %act.session_id, user_id = %act.user_id, "websocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send_event(ctx: &mut ws::WebsocketContext<Self>, event: &ServerEvent) {
        match event.to_payload() {
            Ok(payload) => ctx.text(payload),
            Err(e) => tracing::error!(error = %e, "failed to serialize event"),
        }
    }
}

/// Bridges the registry channel into the actor mailbox until either side closes
pub fn forward_deliveries(mut rx: UnboundedReceiver<String>, addr: Addr<WsSession>) {
    actix::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if !addr.connected() {
                break;
            }
            addr.do_send(Deliver(payload));
        }
    });
}

async fn handle_client_event(
    state: &AppState,
    session_id: SessionId,
    user_id: Uuid,
    event: ClientEvent,
) -> AppResult<()> {
    match event {
        ClientEvent::SendMessage {
            room_id,
            content,
            images_url,
            file_url,
        } => {
            // the sender sees its own message through the room fan-out
            state
                .messages
                .send_message(NewMessage {
                    chat_room_id: room_id,
                    sender_id: user_id,
                    content,
                    images_url,
                    file_url,
                })
                .await?;
        }
        ClientEvent::SendFriendRequest { receiver_id } => {
            state.friends.send_request(user_id, receiver_id).await?;
        }
        ClientEvent::Typing {
            room_id,
            display_name,
        } => {
            if state.registry.is_in_room(session_id, room_id).await {
                state
                    .messages
                    .typing(session_id, room_id, display_name)
                    .await;
            }
        }
        ClientEvent::StopTyping {
            room_id,
            display_name,
        } => {
            if state.registry.is_in_room(session_id, room_id).await {
                state
                    .messages
                    .stop_typing(session_id, room_id, display_name)
                    .await;
            }
        }
        ClientEvent::Ping => {}
    }
    Ok(())
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session_id, user_id = %self.user_id, "websocket session started");
        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(session_id = %self.session_id, user_id = %self.user_id, "websocket session stopped");

        let registry = self.state.registry.clone();
        let session_id = self.session_id;
        actix::spawn(async move {
            registry.unregister(session_id).await;
        });
    }
}

impl Handler<Deliver> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::Ping) => Self::send_event(ctx, &ServerEvent::Pong),
                    Ok(event) => {
                        let state = self.state.clone();
                        let session_id = self.session_id;
                        let user_id = self.user_id;
                        let addr = ctx.address();

                        actix::spawn(async move {
                            if let Err(e) =
                                handle_client_event(&state, session_id, user_id, event).await
                            {
                                tracing::debug!(error = %e, %session_id, "websocket event failed");
                                if let Ok(payload) = ServerEvent::from(&e).to_payload() {
                                    addr.do_send(Deliver(payload));
                                }
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, session_id = %self.session_id, "failed to parse websocket event");
                        let err = AppError::InvalidInput(format!("unrecognized event: {e}"));
                        Self::send_event(ctx, &ServerEvent::from(&err));
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary websocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(?reason, session_id = %self.session_id, "websocket close received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                ctx.stop();
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::warn!(error = %e, session_id = %self.session_id, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WsSettings;
    use crate::repository::{MemoryChatStore, RoomRepository};
    use crypto_core::jwt::JwtKeys;
    use std::sync::Arc;

    fn state(store: &MemoryChatStore) -> AppState {
        AppState::new(
            Arc::new(store.clone()),
            Arc::new(JwtKeys::from_secret("test-secret")),
            WsSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_typing_outside_joined_rooms_is_ignored() {
        let store = MemoryChatStore::new();
        let state = state(&store);
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let bob = store.insert_user("Bob", "bob@example.com").await;
        let room = store.create_group_room("general", &[ann.id, bob.id]).await.unwrap();

        let ann_session = SessionId::new();
        let _ann_rx = state.registry.register(ann.id, ann_session, []).await;
        let mut bob_rx = state.registry.register(bob.id, SessionId::new(), [room.id]).await;

        handle_client_event(
            &state,
            ann_session,
            ann.id,
            ClientEvent::Typing {
                room_id: room.id,
                display_name: "Ann".into(),
            },
        )
        .await
        .unwrap();

        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_message_event_fans_out_to_sender_sessions() {
        let store = MemoryChatStore::new();
        let state = state(&store);
        let ann = store.insert_user("Ann", "ann@example.com").await;
        let room = store.create_group_room("general", &[ann.id]).await.unwrap();
        let session = SessionId::new();
        let mut rx = state.registry.register(ann.id, session, [room.id]).await;

        handle_client_event(
            &state,
            session,
            ann.id,
            ClientEvent::SendMessage {
                room_id: room.id,
                content: "hello".into(),
                images_url: Vec::new(),
                file_url: None,
            },
        )
        .await
        .unwrap();

        let event: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(event["type"], "message-created");
        assert_eq!(event["message"]["content"], "hello");
    }

    #[tokio::test]
    async fn test_failed_event_reports_error() {
        let store = MemoryChatStore::new();
        let state = state(&store);
        let ann = store.insert_user("Ann", "ann@example.com").await;

        let err = handle_client_event(
            &state,
            SessionId::new(),
            ann.id,
            ClientEvent::SendFriendRequest { receiver_id: ann.id },
        )
        .await
        .unwrap_err();

        let value = serde_json::to_value(ServerEvent::from(&err)).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "SELF_REQUEST");
    }

    #[tokio::test]
    async fn test_stop_typing_event_names_the_stopped_user() {
        let store = MemoryChatStore::new();
        let state = state(&store);
        let room_id = Uuid::new_v4();
        let ann = SessionId::new();
        let bob = SessionId::new();
        let _ann_rx = state.registry.register(Uuid::new_v4(), ann, [room_id]).await;
        let _bob_rx = state.registry.register(Uuid::new_v4(), bob, [room_id]).await;
        let mut watcher_rx = state
            .registry
            .register(Uuid::new_v4(), SessionId::new(), [room_id])
            .await;

        for (session, name) in [(ann, "Ann"), (bob, "Bob")] {
            handle_client_event(
                &state,
                session,
                Uuid::new_v4(),
                ClientEvent::Typing {
                    room_id,
                    display_name: name.into(),
                },
            )
            .await
            .unwrap();
        }
        handle_client_event(
            &state,
            ann,
            Uuid::new_v4(),
            ClientEvent::StopTyping {
                room_id,
                display_name: "Ann".into(),
            },
        )
        .await
        .unwrap();

        let mut last = serde_json::Value::Null;
        while let Ok(raw) = watcher_rx.try_recv() {
            last = serde_json::from_str(&raw).unwrap();
        }
        assert_eq!(last["type"], "typing-users-updated");
        assert_eq!(last["displayNames"], serde_json::json!(["Ann"]));
        assert_eq!(last["isTyping"], false);
    }
}
