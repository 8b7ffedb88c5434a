//! One-shot catalog sync.
//!
//! Runs the same job as the `?sync_products` trigger, as a trusted operator.
//! The storefront's in-process product list cache is not reachable from
//! here; its grids pick up the change through the cache version bump.

use std::sync::Arc;

use catalog_bridge_storefront::cache::TransientCache;
use catalog_bridge_storefront::config::{
    CacheConfig, ConfigError, RemoteCatalogConfig, SyncConfig, debug_from_env, media_dir_from_env,
};
use catalog_bridge_storefront::remote::{RemoteCatalog, RemoteCatalogError};
use catalog_bridge_storefront::services::images::{HttpImageFetcher, ImageImporter};
use catalog_bridge_storefront::services::sync::{SyncError, SyncJob, SyncRequester};
use catalog_bridge_storefront::state::Repositories;

use super::{ConnectError, connect};

/// Errors that can occur during a CLI sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncCommandError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] RemoteCatalogError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Run the sync job once.
pub async fn run() -> Result<(), SyncCommandError> {
    let pool = connect().await?;
    let repos = Repositories::postgres(&pool);

    let remote_config = RemoteCatalogConfig::from_env()?;
    let cache_config = CacheConfig::from_env()?;
    let remote = RemoteCatalog::new(
        &remote_config,
        TransientCache::default(),
        cache_config.products_ttl,
    )?;

    let fetcher = HttpImageFetcher::new(remote_config.timeout, remote_config.max_redirects)?;
    let importer = ImageImporter::new(
        Arc::clone(&repos.records),
        Arc::clone(&repos.media),
        Arc::new(fetcher),
        media_dir_from_env(),
    );

    let job = SyncJob::new(
        SyncConfig::from_env()?,
        remote,
        Arc::clone(&repos.records),
        importer,
        Arc::clone(&repos.versions),
        debug_from_env()?,
    );

    tracing::info!(endpoint = %remote_config.endpoint, "Syncing remote catalog...");
    let report = job.run(&SyncRequester::Operator).await?;
    tracing::info!("{report}");
    Ok(())
}
