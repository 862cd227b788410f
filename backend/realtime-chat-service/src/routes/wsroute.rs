use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;
use crate::websocket::session::forward_deliveries;
use crate::websocket::{SessionId, WsSession};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket upgrade, so the token may
/// also come from the query string.
async fn authenticate_ws(
    state: &AppState,
    params: &WsParams,
    req: &HttpRequest,
) -> Result<AuthenticatedUser, AppError> {
    match params.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => state.authenticator.authenticate_token(token).await,
        None => {
            let header = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            state.authenticator.authenticate(header).await
        }
    }
}

/// GET /ws
///
/// Authentication completes before the upgrade; a rejected handshake gets a
/// plain 401 and nothing is registered.
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let authenticated = match authenticate_ws(&state, &query, &req).await {
        Ok(authenticated) => authenticated,
        Err(e) => {
            tracing::warn!(error = %e, "websocket connection rejected");
            return Err(e.into());
        }
    };

    let session_id = SessionId::new();
    let user_id = authenticated.user.id;
    let rx = state
        .registry
        .register(user_id, session_id, authenticated.room_ids)
        .await;

    let session = WsSession::new(session_id, user_id, state.get_ref().clone());
    match ws::start_with_addr(session, &req, stream) {
        Ok((addr, resp)) => {
            forward_deliveries(rx, addr);
            Ok(resp)
        }
        Err(e) => {
            // handshake failed after registration
            state.registry.unregister(session_id).await;
            Err(e)
        }
    }
}
