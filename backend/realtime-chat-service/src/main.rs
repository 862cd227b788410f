use actix_web::{web, App, HttpServer};
use realtime_chat_service::{
    config, db, error, logging, repository::PgChatStore, routes, state::AppState,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = config::Config::from_env()?;

    let pool = db::init_pool(&cfg.database_url, &cfg.db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    let keys = Arc::new(cfg.jwt.keys()?);
    let state = AppState::new(Arc::new(PgChatStore::new(pool)), keys.clone(), cfg.ws.clone());

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting realtime-chat-service");

    let allowed_origins = cfg.cors_allowed_origins.clone();
    HttpServer::new(move || {
        let cors = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
            actix_cors::Cors::default().allow_any_origin()
        } else {
            allowed_origins
                .iter()
                .fold(actix_cors::Cors::default(), |cors, origin| {
                    cors.allowed_origin(origin)
                })
        }
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

        let keys = keys.clone();
        App::new()
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(move |cfg| routes::configure_routes(cfg, keys))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))?;

    tracing::info!("realtime-chat-service stopped");
    Ok(())
}
