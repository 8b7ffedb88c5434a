//! `PostgreSQL` catalog record repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use catalog_bridge_core::{CatalogRecordId, CurrencyCode, MediaId, Price, Sku};

use super::{CatalogStore, RepositoryError, conflict_or_database};
use crate::models::{CatalogRecord, MediaItem, NewCatalogRecord, Thumbnail};

const SELECT_RECORD: &str = r"
    SELECT r.id, r.sku, r.slug, r.title, r.description, r.price,
           r.thumbnail_id, m.public_url AS thumbnail_url,
           r.created_at, r.updated_at
    FROM catalog.record r
    LEFT JOIN catalog.media m ON m.id = r.thumbnail_id
";

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    sku: String,
    slug: String,
    title: String,
    description: String,
    price: Decimal,
    thumbnail_id: Option<i64>,
    thumbnail_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for CatalogRecord {
    type Error = RepositoryError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let sku = Sku::parse(&row.sku)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid sku in database: {e}")))?;

        let thumbnail = match (row.thumbnail_id, row.thumbnail_url) {
            (Some(id), Some(url)) => Some(Thumbnail {
                media_id: MediaId::new(id),
                url,
            }),
            _ => None,
        };

        Ok(Self {
            id: CatalogRecordId::new(row.id),
            sku,
            slug: row.slug,
            title: row.title,
            description: row.description,
            price: Price::new(row.price, CurrencyCode::USD),
            thumbnail,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Catalog records stored in `catalog.record`.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_ids_by_skus(
        &self,
        skus: &[Sku],
    ) -> Result<HashMap<Sku, CatalogRecordId>, RepositoryError> {
        let keys: Vec<String> = skus.iter().map(|s| s.as_str().to_owned()).collect();

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT sku, id FROM catalog.record WHERE sku = ANY($1)")
                .bind(keys)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(sku, id)| {
                let sku = Sku::parse(&sku).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid sku in database: {e}"))
                })?;
                Ok((sku, CatalogRecordId::new(id)))
            })
            .collect()
    }

    async fn get(&self, id: CatalogRecordId) -> Result<Option<CatalogRecord>, RepositoryError> {
        let row: Option<RecordRow> = sqlx::query_as(&format!("{SELECT_RECORD} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CatalogRecord::try_from).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<CatalogRecord>, RepositoryError> {
        let row: Option<RecordRow> =
            sqlx::query_as(&format!("{SELECT_RECORD} WHERE r.slug = $1"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        row.map(CatalogRecord::try_from).transpose()
    }

    async fn create(&self, record: &NewCatalogRecord) -> Result<CatalogRecord, RepositoryError> {
        let (id, created_at, updated_at): (i64, DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            r"
            INSERT INTO catalog.record (sku, slug, title, description, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at, updated_at
            ",
        )
        .bind(record.sku.as_str())
        .bind(&record.slug)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "catalog record"))?;

        Ok(CatalogRecord {
            id: CatalogRecordId::new(id),
            sku: record.sku.clone(),
            slug: record.slug.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            price: record.price(),
            thumbnail: None,
            created_at,
            updated_at,
        })
    }

    async fn update(
        &self,
        id: CatalogRecordId,
        record: &NewCatalogRecord,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE catalog.record
            SET title = $2, description = $3, price = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.price)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_thumbnail(
        &self,
        id: CatalogRecordId,
        media: &MediaItem,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE catalog.record SET thumbnail_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(media.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
