pub mod chat_rooms;
pub mod friends;
pub mod health;
pub mod notifications;
pub mod wsroute;

use actix_middleware::JwtAuthMiddleware;
use actix_web::web;
use crypto_core::jwt::JwtKeys;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};

pub(crate) fn validate_body<T: Validate>(body: &T) -> AppResult<()> {
    body.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))
}

/// Malformed ids and bodies surface as validation errors, not 404s
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::InvalidInput(err.to_string()).into()
    }));
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, keys: Arc<JwtKeys>) {
    extractor_config(cfg);

    cfg.service(health::health)
        .service(health::metrics_endpoint)
        .service(wsroute::ws_handler)
        .service(
            web::scope("/chat-rooms")
                .wrap(JwtAuthMiddleware::new(keys.clone()))
                .configure(chat_rooms::register_routes),
        )
        .service(
            web::scope("/friends")
                .wrap(JwtAuthMiddleware::new(keys.clone()))
                .configure(friends::register_routes),
        )
        .service(
            web::scope("/notifications")
                .wrap(JwtAuthMiddleware::new(keys))
                .configure(notifications::register_routes),
        );
}
