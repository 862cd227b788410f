use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::{NewNotification, NotificationType};
use crate::routes::validate_body;
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationPayload {
    pub receiver_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Defaults to the caller
    pub sender_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub message: Option<String>,
    pub chat_room_id: Option<Uuid>,
}

/// GET /notifications
#[get("")]
pub async fn list_notifications(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let notifications = state.notifications.list(user.id).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

/// POST /notifications
#[post("")]
pub async fn create_notification(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateNotificationPayload>,
) -> Result<HttpResponse, AppError> {
    validate_body(&*body)?;
    let body = body.into_inner();

    let mut notification = NewNotification::new(body.receiver_id, body.notification_type)
        .from_sender(body.sender_id.unwrap_or(user.id));
    notification.message = body.message;
    notification.chat_room_id = body.chat_room_id;

    let created = state.notifications.create(notification).await?;
    Ok(HttpResponse::Created().json(created))
}

/// POST /notifications/read-all
#[post("/read-all")]
pub async fn mark_all_read(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let updated = state.notifications.mark_all_read(user.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

/// POST /notifications/{id}/read
#[post("/{id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notification = state
        .notifications
        .mark_read(user.id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(notification))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_notifications)
        .service(create_notification)
        .service(mark_all_read)
        .service(mark_read);
}
