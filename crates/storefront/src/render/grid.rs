//! Cached product grid rendering.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::cache::{CacheValue, CacheVersionStore, GRID_KEY_PREFIX, TransientCache};
use crate::db::CatalogStore;
use crate::remote::RemoteCatalog;
use crate::services::sku::resolve_skus;

use super::RenderError;
use super::image::product_image;

/// Cards shown when `limit` is absent or unparsable.
pub const DEFAULT_LIMIT: usize = 8;

/// Largest accepted `limit`.
pub const MAX_LIMIT: usize = 100;

/// Options of one grid directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOptions {
    pub limit: usize,
}

impl GridOptions {
    /// Options from a raw `limit` value.
    ///
    /// Missing or unparsable values fall back to [`DEFAULT_LIMIT`]; numbers
    /// are clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn from_limit(raw: Option<&str>) -> Self {
        let limit = match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
            None => DEFAULT_LIMIT,
            Some(n) if n < 1 => 1,
            Some(n) => usize::try_from(n).map_or(MAX_LIMIT, |n| n.min(MAX_LIMIT)),
        };
        Self { limit }
    }

    /// Stable textual form hashed into the cache key.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("limit={}", self.limit)
    }
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Cache key of a rendered grid for the given version.
#[must_use]
pub fn grid_cache_key(version: i64, options: &GridOptions) -> String {
    let digest = Sha256::digest(options.canonical().as_bytes());
    format!("{GRID_KEY_PREFIX}v{version}:{}", hex::encode(digest))
}

struct CardView {
    permalink: String,
    title: String,
    price: String,
    image_html: String,
}

#[derive(Template)]
#[template(path = "catalog/grid.html")]
struct GridTemplate {
    empty: bool,
    cards: Vec<CardView>,
}

/// Renders the product grid, caching markup per cache version and options.
#[derive(Clone)]
pub struct GridRenderer {
    remote: RemoteCatalog,
    records: Arc<dyn CatalogStore>,
    versions: Arc<dyn CacheVersionStore>,
    cache: TransientCache,
    ttl: Duration,
}

impl GridRenderer {
    #[must_use]
    pub fn new(
        remote: RemoteCatalog,
        records: Arc<dyn CatalogStore>,
        versions: Arc<dyn CacheVersionStore>,
        cache: TransientCache,
        ttl: Duration,
    ) -> Self {
        Self {
            remote,
            records,
            versions,
            cache,
            ttl,
        }
    }

    /// Grid markup for `options`.
    ///
    /// Products without a local record are skipped; the first rendered card
    /// gets the high-priority image.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` if storage or template rendering fails.
    #[instrument(skip(self), fields(limit = options.limit))]
    pub async fn render(&self, options: &GridOptions) -> Result<Arc<str>, RenderError> {
        let version = self.versions.current().await?;
        let key = grid_cache_key(version, options);

        if let Some(CacheValue::Html(html)) = self.cache.get(&key).await {
            debug!(key = %key, "Cache hit for rendered grid");
            return Ok(html);
        }

        let html: Arc<str> = Arc::from(self.build(options).await?);
        self.cache
            .set(&key, CacheValue::Html(Arc::clone(&html)), self.ttl)
            .await;
        Ok(html)
    }

    async fn build(&self, options: &GridOptions) -> Result<String, RenderError> {
        let products = self.remote.fetch_products(false).await;
        if products.is_empty() {
            return Ok(GridTemplate {
                empty: true,
                cards: Vec::new(),
            }
            .render()?);
        }

        let shown: Vec<_> = products.iter().take(options.limit).collect();
        let ids: Vec<u64> = shown.iter().map(|p| p.id).collect();
        let resolved = resolve_skus(self.records.as_ref(), &ids).await?;

        let mut cards = Vec::with_capacity(resolved.len());
        for product in shown {
            let Some(&record_id) = resolved.get(&product.sku()) else {
                continue;
            };
            let Some(record) = self.records.get(record_id).await? else {
                continue;
            };

            let image = product_image(&record, product, cards.is_empty());
            cards.push(CardView {
                permalink: record.permalink(),
                title: record.title.clone(),
                price: record.price.display(),
                image_html: image.to_html()?,
            });
        }

        debug!(
            fetched = products.len(),
            rendered = cards.len(),
            "Rendered product grid"
        );

        Ok(GridTemplate {
            empty: false,
            cards,
        }
        .render()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::routing::get;
    use rust_decimal::Decimal;
    use url::Url;

    use catalog_bridge_core::Sku;

    use super::*;
    use crate::cache::MemoryCacheVersion;
    use crate::config::RemoteCatalogConfig;
    use crate::db::memory::MemoryCatalogStore;
    use crate::models::NewCatalogRecord;

    const TWO_PRODUCTS: &str = r#"[
        {"id": 1, "title": "Backpack", "price": 109.95, "description": "bag",
         "image": "https://img.test/1.jpg"},
        {"id": 2, "title": "T-Shirt", "price": 22.3, "description": "shirt",
         "image": "https://img.test/2.jpg"}
    ]"#;

    async fn upstream(body: &'static str) -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/products",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    body
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        (Url::parse(&format!("http://{addr}/products")).unwrap(), hits)
    }

    struct Fixture {
        renderer: GridRenderer,
        records: Arc<MemoryCatalogStore>,
        versions: Arc<MemoryCacheVersion>,
        hits: Arc<AtomicUsize>,
    }

    async fn fixture(body: &'static str) -> Fixture {
        let (endpoint, hits) = upstream(body).await;
        let cache = TransientCache::default();
        let remote = RemoteCatalog::new(
            &RemoteCatalogConfig {
                endpoint,
                ..RemoteCatalogConfig::default()
            },
            cache.clone(),
            Duration::from_secs(900),
        )
        .unwrap();
        let records = Arc::new(MemoryCatalogStore::new());
        let versions = Arc::new(MemoryCacheVersion::new());
        let renderer = GridRenderer::new(
            remote,
            records.clone(),
            versions.clone(),
            cache,
            Duration::from_secs(300),
        );
        Fixture {
            renderer,
            records,
            versions,
            hits,
        }
    }

    async fn add_record(store: &MemoryCatalogStore, id: u64, title: &str) {
        store
            .create(&NewCatalogRecord {
                sku: Sku::from_external_id(id),
                slug: format!("item-{id}"),
                title: title.to_string(),
                description: String::new(),
                price: Decimal::new(2230, 2),
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_limit_parsing() {
        assert_eq!(GridOptions::from_limit(None).limit, 8);
        assert_eq!(GridOptions::from_limit(Some("3")).limit, 3);
        assert_eq!(GridOptions::from_limit(Some(" 12 ")).limit, 12);
        assert_eq!(GridOptions::from_limit(Some("0")).limit, 1);
        assert_eq!(GridOptions::from_limit(Some("-4")).limit, 1);
        assert_eq!(GridOptions::from_limit(Some("5000")).limit, 100);
        assert_eq!(GridOptions::from_limit(Some("many")).limit, 8);
    }

    #[test]
    fn test_cache_key_depends_on_version_and_options() {
        let eight = GridOptions::default();
        let three = GridOptions::from_limit(Some("3"));

        assert!(grid_cache_key(1, &eight).starts_with("catalog:grid:v1:"));
        assert_ne!(grid_cache_key(1, &eight), grid_cache_key(2, &eight));
        assert_ne!(grid_cache_key(1, &eight), grid_cache_key(1, &three));
        assert_eq!(grid_cache_key(1, &eight), grid_cache_key(1, &GridOptions::default()));
    }

    #[tokio::test]
    async fn test_only_matched_products_are_rendered() {
        let f = fixture(TWO_PRODUCTS).await;
        add_record(&f.records, 2, "T-Shirt").await;

        let html = f.renderer.render(&GridOptions::default()).await.unwrap();

        assert_eq!(html.matches("api-product-card").count(), 1);
        assert!(html.contains("/products/item-2"));
        assert!(html.contains("$22.30"));
        assert!(html.contains(r#"fetchpriority="high""#));
        assert!(!html.contains(r#"fetchpriority="low""#));
    }

    #[tokio::test]
    async fn test_empty_catalog_message() {
        let f = fixture("[]").await;
        let html = f.renderer.render(&GridOptions::default()).await.unwrap();
        assert!(html.contains("No products available"));
    }

    #[tokio::test]
    async fn test_cached_markup_until_version_bump() {
        let f = fixture(TWO_PRODUCTS).await;
        add_record(&f.records, 1, "Backpack").await;

        let first = f.renderer.render(&GridOptions::default()).await.unwrap();
        add_record(&f.records, 2, "T-Shirt").await;

        let cached = f.renderer.render(&GridOptions::default()).await.unwrap();
        assert_eq!(first, cached);
        assert_eq!(f.records.sku_lookups(), 1);

        f.versions.bump().await.unwrap();
        let fresh = f.renderer.render(&GridOptions::default()).await.unwrap();

        assert_eq!(f.records.sku_lookups(), 2);
        assert_eq!(fresh.matches("api-product-card").count(), 2);
        // The product list itself stayed cached.
        assert_eq!(f.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_limit_truncates_before_matching() {
        let f = fixture(TWO_PRODUCTS).await;
        add_record(&f.records, 1, "Backpack").await;
        add_record(&f.records, 2, "T-Shirt").await;

        let html = f
            .renderer
            .render(&GridOptions::from_limit(Some("1")))
            .await
            .unwrap();
        assert_eq!(html.matches("api-product-card").count(), 1);
        assert!(html.contains("Backpack"));
    }
}
