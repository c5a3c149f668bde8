pub mod attendance;
pub mod create;
pub mod members;
pub mod utils;

pub use create::create_tables;

use std::str::FromStr;

use shared::types::server_config::DatabaseConfig;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

/// Open the pool and make sure the schema exists.
pub async fn connect(config: &DatabaseConfig) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url())?.foreign_keys(true);

    // Every connection to `:memory:` is its own database, so pin the pool
    // to one long-lived connection.
    let pool_options = if config.path == ":memory:" {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options.connect_with(options).await?;
    info!("Database opened: {}", config.path);

    create_tables(&pool).await?;
    Ok(pool)
}
