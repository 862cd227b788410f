use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{error, info};

use crate::config::DbSettings;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects, verifies the connection and applies pending migrations
pub async fn init_pool(
    database_url: &str,
    settings: &DbSettings,
) -> Result<Pool<Postgres>, sqlx::Error> {
    tracing::debug!(
        max = settings.max_connections,
        min = settings.min_connections,
        acquire_timeout_secs = settings.acquire_timeout.as_secs(),
        "creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    match tokio::time::timeout(VERIFY_TIMEOUT, sqlx::query("SELECT 1").execute(&pool)).await {
        Ok(Ok(_)) => info!("database pool created and verified"),
        Ok(Err(e)) => {
            error!(error = %e, "database connection verification failed");
            return Err(e);
        }
        Err(_) => {
            error!(timeout_secs = VERIFY_TIMEOUT.as_secs(), "database verification timeout");
            return Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "database verification timeout",
            )));
        }
    }

    MIGRATOR.run(&pool).await?;
    Ok(pool)
}
