//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::{CacheVersionStore, MemoryCacheVersion, TransientCache};
use crate::config::StorefrontConfig;
use crate::db::memory::{MemoryCatalogStore, MemoryMediaLibrary, MemoryUserStore};
use crate::db::{
    CatalogStore, MediaLibrary, PgCacheVersion, PgCatalogStore, PgMediaLibrary, PgUserStore,
    UserStore,
};
use crate::remote::{RemoteCatalog, RemoteCatalogError};
use crate::render::GridRenderer;
use crate::services::auth::AuthService;
use crate::services::images::{HttpImageFetcher, ImageFetcher, ImageImporter};
use crate::services::sync::SyncJob;

/// Entries the transient cache holds before evicting.
const CACHE_CAPACITY: u64 = 1_000;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("remote catalog client: {0}")]
    Remote(#[from] RemoteCatalogError),
    #[error("image fetcher: {0}")]
    ImageFetcher(#[from] reqwest::Error),
}

/// The storage backends the application runs against.
#[derive(Clone)]
pub struct Repositories {
    pub records: Arc<dyn CatalogStore>,
    pub media: Arc<dyn MediaLibrary>,
    pub users: Arc<dyn UserStore>,
    pub versions: Arc<dyn CacheVersionStore>,
}

impl Repositories {
    /// `PostgreSQL`-backed repositories sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            records: Arc::new(PgCatalogStore::new(pool.clone())),
            media: Arc::new(PgMediaLibrary::new(pool.clone())),
            users: Arc::new(PgUserStore::new(pool.clone())),
            versions: Arc::new(PgCacheVersion::new(pool.clone())),
        }
    }

    /// Process-local repositories with no persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(MemoryCatalogStore::new()),
            media: Arc::new(MemoryMediaLibrary::new()),
            users: Arc::new(MemoryUserStore::new()),
            versions: Arc::new(MemoryCacheVersion::new()),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the configuration, repositories and catalog services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    repos: Repositories,
    remote: RemoteCatalog,
    grid: GridRenderer,
    sync: SyncJob,
    auth: AuthService,
}

impl AppState {
    /// Build the state, downloading images over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, repos: Repositories) -> Result<Self, StateError> {
        let fetcher = HttpImageFetcher::new(config.remote.timeout, config.remote.max_redirects)?;
        Self::with_fetcher(config, repos, Arc::new(fetcher))
    }

    /// Build the state with a custom image fetcher.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the remote catalog client cannot be built.
    pub fn with_fetcher(
        config: StorefrontConfig,
        repos: Repositories,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Result<Self, StateError> {
        let cache = TransientCache::new(CACHE_CAPACITY);
        let remote = RemoteCatalog::new(&config.remote, cache.clone(), config.cache.products_ttl)?;

        let grid = GridRenderer::new(
            remote.clone(),
            Arc::clone(&repos.records),
            Arc::clone(&repos.versions),
            cache,
            config.cache.render_ttl,
        );

        let importer = ImageImporter::new(
            Arc::clone(&repos.records),
            Arc::clone(&repos.media),
            fetcher,
            config.media_dir.clone(),
        );
        let sync = SyncJob::new(
            config.sync.clone(),
            remote.clone(),
            Arc::clone(&repos.records),
            importer,
            Arc::clone(&repos.versions),
            config.debug,
        );

        let auth = AuthService::new(Arc::clone(&repos.users));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                repos,
                remote,
                grid,
                sync,
                auth,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Catalog record storage.
    #[must_use]
    pub fn records(&self) -> &dyn CatalogStore {
        self.inner.repos.records.as_ref()
    }

    /// Render cache version counter.
    #[must_use]
    pub fn versions(&self) -> &dyn CacheVersionStore {
        self.inner.repos.versions.as_ref()
    }

    /// Remote catalog client.
    #[must_use]
    pub fn remote(&self) -> &RemoteCatalog {
        &self.inner.remote
    }

    /// Product grid renderer.
    #[must_use]
    pub fn grid(&self) -> &GridRenderer {
        &self.inner.grid
    }

    /// Catalog sync job.
    #[must_use]
    pub fn sync(&self) -> &SyncJob {
        &self.inner.sync
    }

    /// Authentication service.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }
}
