//! CLI command implementations.

pub mod cache;
pub mod migrate;
pub mod sync;
pub mod user;

use sqlx::PgPool;

use catalog_bridge_storefront::config::{ConfigError, get_database_url};
use catalog_bridge_storefront::db::create_pool;

/// Errors shared by every command that needs the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Load `.env` and connect to the catalog database.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("CATALOG_DATABASE_URL")?;

    tracing::info!("Connecting to catalog database...");
    Ok(create_pool(&database_url).await?)
}
