use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::NewMessage;
use crate::routes::validate_body;
use crate::state::AppState;
use actix_web::{get, patch, post, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

// ==================== Request Types ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 500))]
    pub participant_ids: Vec<Uuid>,
}

/// Attachments arrive as URLs already stored by the upload collaborator
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub images_url: Vec<String>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageRequest {
    pub message_id: Uuid,
}

// ==================== Rooms ====================

/// POST /chat-rooms
#[post("")]
pub async fn create_room(
    state: web::Data<AppState>,
    _user: User,
    body: web::Json<CreateRoomRequest>,
) -> Result<HttpResponse, AppError> {
    validate_body(&*body)?;
    let room = state
        .rooms
        .create_group_room(&body.name, &body.participant_ids)
        .await?;
    Ok(HttpResponse::Created().json(room))
}

/// GET /chat-rooms/user/{user_id}
///
/// Any authenticated caller may list any user's rooms.
#[get("/user/{user_id}")]
pub async fn rooms_for_user(
    state: web::Data<AppState>,
    _user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let rooms = state.rooms.rooms_for_user(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(rooms))
}

// ==================== Messages ====================

/// GET /chat-rooms/{room_id}/messages
#[get("/{room_id}/messages")]
pub async fn list_messages(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let messages = state.messages.messages(user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// GET /chat-rooms/{room_id}/messages/{message_id}
#[get("/{room_id}/messages/{message_id}")]
pub async fn get_message(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (room_id, message_id) = path.into_inner();
    let message = state.messages.message(user.id, room_id, message_id).await?;
    Ok(HttpResponse::Ok().json(message))
}

/// POST /chat-rooms/{room_id}/messages
#[post("/{room_id}/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    validate_body(&*body)?;
    let body = body.into_inner();
    let message = state
        .messages
        .send_message(NewMessage {
            chat_room_id: path.into_inner(),
            sender_id: user.id,
            content: body.content,
            images_url: body.images_url,
            file_url: body.file_url,
        })
        .await?;
    Ok(HttpResponse::Created().json(message))
}

/// PATCH /chat-rooms/messages/delete
#[patch("/messages/delete")]
pub async fn delete_message(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<DeleteMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let message = state
        .messages
        .delete_message(user.id, body.message_id)
        .await?;
    Ok(HttpResponse::Ok().json(message))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_room)
        .service(rooms_for_user)
        .service(delete_message)
        .service(list_messages)
        .service(get_message)
        .service(send_message);
}
