//! Database operations for the catalog `PostgreSQL` schema.
//!
//! # Schema: `catalog`
//!
//! ## Tables
//!
//! - `user` - Accounts that can sign in (argon2 password hashes, roles)
//! - `record` - Local catalog records, one per SKU
//! - `media` - Imported images, one per source URL
//! - `settings` - Integer settings (the render cache version)
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p catalog-bridge-cli -- migrate
//! ```
//!
//! Every table is reached through a trait so request handlers and the sync
//! job can run against the in-memory implementations in [`memory`].

pub mod media;
pub mod memory;
pub mod records;
pub mod settings;
pub mod users;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use catalog_bridge_core::{CatalogRecordId, Sku, UserId, UserRole};

use crate::models::{CatalogRecord, MediaItem, NewCatalogRecord, NewMediaItem, User};

pub use media::PgMediaLibrary;
pub use records::PgCatalogStore;
pub use settings::PgCacheVersion;
pub use users::PgUserStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Catalog record storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Map each known SKU to its record ID in one query. Unknown SKUs are
    /// absent from the result.
    async fn find_ids_by_skus(
        &self,
        skus: &[Sku],
    ) -> Result<HashMap<Sku, CatalogRecordId>, RepositoryError>;

    /// Load a record with its thumbnail.
    async fn get(&self, id: CatalogRecordId) -> Result<Option<CatalogRecord>, RepositoryError>;

    /// Load a record by its permalink slug.
    async fn get_by_slug(&self, slug: &str) -> Result<Option<CatalogRecord>, RepositoryError>;

    /// Insert a record.
    ///
    /// Returns `RepositoryError::Conflict` when the SKU or slug already exists.
    async fn create(&self, record: &NewCatalogRecord) -> Result<CatalogRecord, RepositoryError>;

    /// Overwrite title, description and price. The SKU and slug never change.
    async fn update(
        &self,
        id: CatalogRecordId,
        record: &NewCatalogRecord,
    ) -> Result<(), RepositoryError>;

    /// Make `media` the record's primary image.
    async fn set_thumbnail(
        &self,
        id: CatalogRecordId,
        media: &MediaItem,
    ) -> Result<(), RepositoryError>;

    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Imported image storage.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Find the media item downloaded from exactly `source_url`.
    async fn find_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<MediaItem>, RepositoryError>;

    /// Register a downloaded image.
    ///
    /// Returns `RepositoryError::Conflict` when the source URL is already
    /// registered.
    async fn insert(&self, item: &NewMediaItem) -> Result<MediaItem, RepositoryError>;
}

/// User account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by (lowercased) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Find a user by ID.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Change a user's role. Returns `RepositoryError::NotFound` for an unknown ID.
    async fn set_role(&self, id: UserId, role: UserRole) -> Result<(), RepositoryError>;

    /// Create a user. Returns `RepositoryError::Conflict` for a taken email.
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<User, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique violation to `RepositoryError::Conflict`.
fn conflict_or_database(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}
