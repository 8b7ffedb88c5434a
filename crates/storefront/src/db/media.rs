//! `PostgreSQL` media library.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use catalog_bridge_core::MediaId;

use super::{MediaLibrary, RepositoryError, conflict_or_database};
use crate::models::{MediaItem, NewMediaItem};

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: i64,
    source_url: String,
    public_url: String,
    file_path: String,
    mime_type: String,
    byte_size: i64,
    created_at: DateTime<Utc>,
}

impl From<MediaRow> for MediaItem {
    fn from(row: MediaRow) -> Self {
        Self {
            id: MediaId::new(row.id),
            source_url: row.source_url,
            public_url: row.public_url,
            file_path: row.file_path,
            mime_type: row.mime_type,
            byte_size: row.byte_size,
            created_at: row.created_at,
        }
    }
}

/// Imported images stored in `catalog.media`.
#[derive(Clone)]
pub struct PgMediaLibrary {
    pool: PgPool,
}

impl PgMediaLibrary {
    /// Create a new media repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaLibrary for PgMediaLibrary {
    async fn find_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<MediaItem>, RepositoryError> {
        let row: Option<MediaRow> = sqlx::query_as(
            r"
            SELECT id, source_url, public_url, file_path, mime_type, byte_size, created_at
            FROM catalog.media
            WHERE source_url = $1
            ",
        )
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MediaItem::from))
    }

    async fn insert(&self, item: &NewMediaItem) -> Result<MediaItem, RepositoryError> {
        let row: MediaRow = sqlx::query_as(
            r"
            INSERT INTO catalog.media (source_url, public_url, file_path, mime_type, byte_size)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, source_url, public_url, file_path, mime_type, byte_size, created_at
            ",
        )
        .bind(&item.source_url)
        .bind(&item.public_url)
        .bind(&item.file_path)
        .bind(&item.mime_type)
        .bind(item.byte_size)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "media source url"))?;

        Ok(row.into())
    }
}
