//! Integer settings stored in `catalog.settings`.
//!
//! Currently holds the render cache version.

use async_trait::async_trait;
use sqlx::PgPool;

use super::RepositoryError;
use crate::cache::CacheVersionStore;

/// Settings key of the render cache version.
pub const CACHE_VERSION_KEY: &str = "catalog_cache_version";

/// Cache version persisted in `PostgreSQL`.
///
/// The row is created by the first bump; until then the version reads as 1.
#[derive(Clone)]
pub struct PgCacheVersion {
    pool: PgPool,
}

impl PgCacheVersion {
    /// Create a new cache version store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheVersionStore for PgCacheVersion {
    async fn current(&self) -> Result<i64, RepositoryError> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT value FROM catalog.settings WHERE key = $1")
                .bind(CACHE_VERSION_KEY)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.unwrap_or(1))
    }

    async fn bump(&self) -> Result<i64, RepositoryError> {
        let value: i64 = sqlx::query_scalar(
            r"
            INSERT INTO catalog.settings (key, value)
            VALUES ($1, 2)
            ON CONFLICT (key) DO UPDATE
                SET value = catalog.settings.value + 1, updated_at = NOW()
            RETURNING value
            ",
        )
        .bind(CACHE_VERSION_KEY)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }
}
