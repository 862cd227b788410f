use crate::error::AppError;
use crate::middleware::guards::User;
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestBody {
    pub receiver_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUserBody {
    pub user_id_to_block: Uuid,
}

/// POST /friends/request
#[post("/request")]
pub async fn send_request(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<FriendRequestBody>,
) -> Result<HttpResponse, AppError> {
    let friend = state.friends.send_request(user.id, body.receiver_id).await?;
    Ok(HttpResponse::Created().json(friend))
}

/// POST /friends/block
#[post("/block")]
pub async fn block_user(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<BlockUserBody>,
) -> Result<HttpResponse, AppError> {
    let friend = state.friends.block_user(user.id, body.user_id_to_block).await?;
    Ok(HttpResponse::Ok().json(friend))
}

/// POST /friends/{id}/accept
#[post("/{id}/accept")]
pub async fn accept_request(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let accepted = state
        .friends
        .accept_request(user.id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(accepted))
}

/// POST /friends/{id}/decline
#[post("/{id}/decline")]
pub async fn decline_request(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let declined = state
        .friends
        .decline_request(user.id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(declined))
}

/// GET /friends
#[get("")]
pub async fn get_friends(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let friends = state.friends.get_friends(user.id).await?;
    Ok(HttpResponse::Ok().json(friends))
}

/// GET /friends/received
#[get("/received")]
pub async fn get_received_requests(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let requests = state.friends.get_received_requests(user.id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(send_request)
        .service(block_user)
        .service(accept_request)
        .service(decline_request)
        .service(get_friends)
        .service(get_received_requests);
}
