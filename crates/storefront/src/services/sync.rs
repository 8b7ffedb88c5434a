//! Remote catalog sync.
//!
//! Copies every remote product into the local catalog: records are created
//! once per SKU, optionally refreshed, and get the remote image as their
//! thumbnail. Afterwards the cached product list is dropped and the render
//! cache version is bumped so every grid is rebuilt.
//!
//! Only one sync runs at a time per process. Concurrent creates from other
//! processes are caught by the unique SKU constraint.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use catalog_bridge_core::{CatalogRecordId, ExternalProduct, Sku};

use crate::cache::CacheVersionStore;
use crate::config::SyncConfig;
use crate::db::{CatalogStore, RepositoryError};
use crate::models::{CurrentUser, NewCatalogRecord};
use crate::remote::RemoteCatalog;

use super::images::{ImageImporter, ImportOutcome};
use super::sku::resolve_skus;

/// Who asked for a sync.
#[derive(Debug, Clone)]
pub enum SyncRequester {
    /// No signed-in user.
    Anonymous,
    /// A signed-in user; needs the catalog-management capability.
    User(CurrentUser),
    /// A trusted local operator (the CLI).
    Operator,
}

/// Reasons a sync ends without running.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Catalog management is not active.")]
    CommerceDisabled,

    #[error("You must be signed in to sync products.")]
    Unauthenticated,

    #[error("You are not allowed to manage the product catalog.")]
    Forbidden,

    #[error("A product sync is already running.")]
    AlreadyRunning,

    #[error("Failed to fetch products from the remote catalog.")]
    FetchFailed,

    #[error("Product sync failed: {0}")]
    Storage(#[from] RepositoryError),
}

impl SyncError {
    /// HTTP status for the terminal response.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::CommerceDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::AlreadyRunning => StatusCode::CONFLICT,
            Self::FetchFailed => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub reused: usize,
    pub images_attached: usize,
    pub image_failures: usize,
    pub record_failures: usize,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Products synced: {} fetched, {} created, {} updated, {} unchanged, \
             {} images attached, {} image failures, {} record failures.",
            self.fetched,
            self.created,
            self.updated,
            self.reused,
            self.images_attached,
            self.image_failures,
            self.record_failures,
        )
    }
}

/// What happened to a product's record.
enum RecordAction {
    Created,
    Updated,
    Reused,
}

/// The sync job. Cheap to clone; clones share the running guard.
#[derive(Clone)]
pub struct SyncJob {
    inner: Arc<SyncJobInner>,
}

struct SyncJobInner {
    config: SyncConfig,
    remote: RemoteCatalog,
    records: Arc<dyn CatalogStore>,
    importer: ImageImporter,
    versions: Arc<dyn CacheVersionStore>,
    running: tokio::sync::Mutex<()>,
    debug: bool,
}

impl SyncJob {
    #[must_use]
    pub fn new(
        config: SyncConfig,
        remote: RemoteCatalog,
        records: Arc<dyn CatalogStore>,
        importer: ImageImporter,
        versions: Arc<dyn CacheVersionStore>,
        debug: bool,
    ) -> Self {
        Self {
            inner: Arc::new(SyncJobInner {
                config,
                remote,
                records,
                importer,
                versions,
                running: tokio::sync::Mutex::new(()),
                debug,
            }),
        }
    }

    /// Query parameter that triggers a sync over HTTP.
    #[must_use]
    pub fn trigger_param(&self) -> &str {
        &self.inner.config.trigger_param
    }

    /// Whether a sync is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.try_lock().is_err()
    }

    /// Run a sync for `requester`.
    ///
    /// # Errors
    ///
    /// Returns the first failed precondition (commerce disabled,
    /// unauthenticated, unauthorized, already running), `FetchFailed` when the
    /// remote catalog is empty, or `Storage` when the SKU lookup fails.
    /// Per-product failures are counted in the report instead.
    #[instrument(skip(self, requester), fields(requester = requester_label(requester)))]
    pub async fn run(&self, requester: &SyncRequester) -> Result<SyncReport, SyncError> {
        if !self.inner.config.commerce_enabled {
            return Err(SyncError::CommerceDisabled);
        }
        match requester {
            SyncRequester::Anonymous => return Err(SyncError::Unauthenticated),
            SyncRequester::User(user) if !user.can_manage_catalog() => {
                return Err(SyncError::Forbidden);
            }
            SyncRequester::User(_) | SyncRequester::Operator => {}
        }

        let _guard = self
            .inner
            .running
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let products = self.inner.remote.fetch_products(true).await;
        if products.is_empty() {
            warn!("Sync aborted: remote catalog returned no products");
            return Err(SyncError::FetchFailed);
        }

        let ids: Vec<u64> = products.iter().map(|p| p.id).collect();
        let existing = resolve_skus(self.inner.records.as_ref(), &ids).await?;

        let mut report = SyncReport {
            fetched: products.len(),
            ..SyncReport::default()
        };

        for product in products.iter() {
            let record_id = match self.sync_record(product, existing.get(&product.sku())).await {
                Ok((id, action)) => {
                    match action {
                        RecordAction::Created => report.created += 1,
                        RecordAction::Updated => report.updated += 1,
                        RecordAction::Reused => report.reused += 1,
                    }
                    id
                }
                Err(e) => {
                    error!(sku = %product.sku(), error = %e, "Failed to sync catalog record");
                    report.record_failures += 1;
                    continue;
                }
            };

            let Some(image) = &product.image else {
                continue;
            };
            match self.inner.importer.import(record_id, image.as_str()).await {
                Ok(ImportOutcome::Downloaded(_) | ImportOutcome::Reused(_)) => {
                    report.images_attached += 1;
                }
                Ok(ImportOutcome::AlreadyPresent(_)) => {}
                Err(e) => {
                    report.image_failures += 1;
                    if self.inner.debug {
                        warn!(record = %record_id, image = %image, error = %e, "Image import failed");
                    } else {
                        debug!(record = %record_id, image = %image, error = %e, "Image import failed");
                    }
                }
            }
        }

        self.inner.remote.invalidate().await;
        match self.inner.versions.bump().await {
            Ok(version) => debug!(version, "Bumped render cache version"),
            Err(e) => error!(error = %e, "Failed to bump render cache version"),
        }

        info!(
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            reused = report.reused,
            images_attached = report.images_attached,
            image_failures = report.image_failures,
            record_failures = report.record_failures,
            "Product sync finished"
        );

        Ok(report)
    }

    /// Create the record for `product`, or reuse (and optionally refresh) the
    /// existing one.
    async fn sync_record(
        &self,
        product: &ExternalProduct,
        existing: Option<&CatalogRecordId>,
    ) -> Result<(CatalogRecordId, RecordAction), RepositoryError> {
        let fields = NewCatalogRecord::from_external(product);

        if let Some(&id) = existing {
            return self.reuse(id, &fields).await;
        }

        match self.inner.records.create(&fields).await {
            Ok(record) => Ok((record.id, RecordAction::Created)),
            // Created since the batch lookup; treat as existing.
            Err(RepositoryError::Conflict(_)) => {
                let id = self.lookup(&fields.sku).await?;
                self.reuse(id, &fields).await
            }
            Err(e) => Err(e),
        }
    }

    async fn reuse(
        &self,
        id: CatalogRecordId,
        fields: &NewCatalogRecord,
    ) -> Result<(CatalogRecordId, RecordAction), RepositoryError> {
        if self.inner.config.update_existing {
            self.inner.records.update(id, fields).await?;
            Ok((id, RecordAction::Updated))
        } else {
            Ok((id, RecordAction::Reused))
        }
    }

    async fn lookup(&self, sku: &Sku) -> Result<CatalogRecordId, RepositoryError> {
        self.inner
            .records
            .find_ids_by_skus(std::slice::from_ref(sku))
            .await?
            .remove(sku)
            .ok_or(RepositoryError::NotFound)
    }
}

const fn requester_label(requester: &SyncRequester) -> &'static str {
    match requester {
        SyncRequester::Anonymous => "anonymous",
        SyncRequester::User(_) => "user",
        SyncRequester::Operator => "operator",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::Router;
    use axum::routing::get;
    use url::Url;

    use catalog_bridge_core::{UserId, UserRole};

    use super::*;
    use crate::cache::{MemoryCacheVersion, TransientCache};
    use crate::config::RemoteCatalogConfig;
    use crate::db::memory::{MemoryCatalogStore, MemoryMediaLibrary};
    use crate::services::images::{FetchedImage, ImageFetcher, ImportError};

    const CATALOG: &str = r#"[
        {"id": 1, "title": "Backpack", "price": 109.95, "description": "bag",
         "image": "https://img.test/1.jpg"},
        {"id": 2, "title": "T-Shirt", "price": 22.3, "description": "shirt",
         "image": "https://img.test/shared.jpg"},
        {"id": 3, "title": "Jacket", "price": 55.99, "description": "coat",
         "image": "https://img.test/shared.jpg"}
    ]"#;

    struct StaticFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> Result<FetchedImage, ImportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedImage {
                content_type: "image/jpeg".to_string(),
                bytes: vec![1, 2, 3],
            })
        }
    }

    async fn upstream(body: &'static str) -> Url {
        let app = Router::new().route("/products", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        Url::parse(&format!("http://{addr}/products")).unwrap()
    }

    struct Fixture {
        job: SyncJob,
        records: Arc<MemoryCatalogStore>,
        versions: Arc<MemoryCacheVersion>,
        fetcher: Arc<StaticFetcher>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(body: &'static str, config: SyncConfig) -> Fixture {
        let endpoint = upstream(body).await;
        let remote = RemoteCatalog::new(
            &RemoteCatalogConfig {
                endpoint,
                ..RemoteCatalogConfig::default()
            },
            TransientCache::default(),
            Duration::from_secs(900),
        )
        .unwrap();
        let records = Arc::new(MemoryCatalogStore::new());
        let versions = Arc::new(MemoryCacheVersion::new());
        let fetcher = Arc::new(StaticFetcher {
            calls: AtomicUsize::new(0),
        });
        let dir = tempfile::tempdir().unwrap();
        let importer = ImageImporter::new(
            records.clone(),
            Arc::new(MemoryMediaLibrary::new()),
            fetcher.clone(),
            PathBuf::from(dir.path()),
        );
        let job = SyncJob::new(config, remote, records.clone(), importer, versions.clone(), true);

        Fixture {
            job,
            records,
            versions,
            fetcher,
            _dir: dir,
        }
    }

    fn user(role: UserRole) -> SyncRequester {
        SyncRequester::User(CurrentUser {
            id: UserId::new(1),
            email: "staff@shop.test".to_string(),
            role,
        })
    }

    #[tokio::test]
    async fn test_preconditions_in_order() {
        let disabled = fixture(
            CATALOG,
            SyncConfig {
                commerce_enabled: false,
                ..SyncConfig::default()
            },
        )
        .await;
        let err = disabled.job.run(&SyncRequester::Anonymous).await.unwrap_err();
        assert!(matches!(err, SyncError::CommerceDisabled));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let f = fixture(CATALOG, SyncConfig::default()).await;
        let err = f.job.run(&SyncRequester::Anonymous).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = f.job.run(&user(UserRole::Customer)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(f.records.is_empty());
    }

    #[tokio::test]
    async fn test_sync_creates_records_and_shares_images() {
        let f = fixture(CATALOG, SyncConfig::default()).await;

        let report = f.job.run(&user(UserRole::ShopManager)).await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.created, 3);
        assert_eq!(report.images_attached, 3);
        assert_eq!(report.image_failures, 0);
        assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.versions.current().await.unwrap(), 2);
        assert!(f.records.records().iter().all(|r| r.thumbnail.is_some()));
    }

    #[tokio::test]
    async fn test_resync_creates_no_duplicates() {
        let f = fixture(CATALOG, SyncConfig::default()).await;

        f.job.run(&SyncRequester::Operator).await.unwrap();
        let second = f.job.run(&SyncRequester::Operator).await.unwrap();

        assert_eq!(second.created, 0);
        assert_eq!(second.reused, 3);
        assert_eq!(second.images_attached, 0);
        assert_eq!(f.records.len(), 3);
        assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_update_existing_reapplies_fields() {
        let f = fixture(
            CATALOG,
            SyncConfig {
                update_existing: true,
                ..SyncConfig::default()
            },
        )
        .await;

        f.job.run(&SyncRequester::Operator).await.unwrap();
        let second = f.job.run(&SyncRequester::Operator).await.unwrap();

        assert_eq!(second.updated, 3);
        assert_eq!(second.reused, 0);
        assert_eq!(f.records.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_fetch_failure() {
        let f = fixture("[]", SyncConfig::default()).await;
        let err = f.job.run(&SyncRequester::Operator).await.unwrap_err();

        assert!(matches!(err, SyncError::FetchFailed));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(f.versions.current().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let f = fixture(CATALOG, SyncConfig::default()).await;

        let _held = f.job.inner.running.lock().await;
        assert!(f.job.is_running());

        let err = f.job.run(&SyncRequester::Operator).await.unwrap_err();
        assert!(matches!(err, SyncError::AlreadyRunning));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_report_summary() {
        let report = SyncReport {
            fetched: 2,
            created: 1,
            reused: 1,
            images_attached: 1,
            ..SyncReport::default()
        };
        let text = report.to_string();
        assert!(text.starts_with("Products synced: 2 fetched, 1 created"));
        assert!(text.contains("1 images attached"));
    }
}
