use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;

use gateway_config::DatabaseConfig;

/// Builds the shared Postgres pool: min 1, max 10, 1h max lifetime,
/// pre-ping (`test_before_acquire`) on every checkout.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database);

    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(10)
        .max_lifetime(Duration::from_secs(3600))
        .test_before_acquire(true)
        .connect_with(options)
        .await
}

/// Applies the embedded migration set. Idempotent; safe to call on every
/// boot.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
