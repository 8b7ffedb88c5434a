//! Render cache commands.

use catalog_bridge_storefront::cache::CacheVersionStore;
use catalog_bridge_storefront::db::{PgCacheVersion, RepositoryError};

use super::{ConnectError, connect};

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Bump the render cache version.
pub async fn bump() -> Result<(), CacheError> {
    let pool = connect().await?;
    let version = PgCacheVersion::new(pool).bump().await?;

    tracing::info!("Render cache version is now {version}");
    Ok(())
}
