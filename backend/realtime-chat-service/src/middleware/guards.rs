//! Request guards resolving the authenticated caller at the type level

use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use actix_middleware::UserId;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};

/// Caller of a request behind `JwtAuthMiddleware`, checked to still exist
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

impl FromRequest for User {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let user_id = req.extensions().get::<UserId>().map(|u| u.0);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let user_id = user_id.ok_or(AppError::Unauthenticated)?;
            let state = state.ok_or(AppError::Internal)?;
            let user = state.authenticator.resolve(user_id).await?;
            Ok(User {
                id: user.id,
                name: user.name,
            })
        })
    }
}
