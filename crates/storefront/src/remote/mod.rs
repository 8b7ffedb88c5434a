//! Remote product catalog client.
//!
//! One GET to a fixed JSON endpoint returning a list of
//! `{id, title, price, description, image}` objects. The decoded list is kept
//! in the [`TransientCache`] under [`PRODUCTS_KEY`].
//!
//! Callers never see transport errors: any failure degrades to an empty list
//! and is logged here.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use catalog_bridge_core::{ExternalProduct, RawProduct};

use crate::cache::{CacheValue, PRODUCTS_KEY, TransientCache};
use crate::config::RemoteCatalogConfig;

/// Errors that can occur when fetching the remote catalog.
#[derive(Debug, Error)]
pub enum RemoteCatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status.
    #[error("upstream returned {status}")]
    Status { status: reqwest::StatusCode },

    /// Body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Body was JSON but not a list.
    #[error("expected a JSON array, got {0}")]
    NotAList(&'static str),
}

/// Client for the remote product catalog.
#[derive(Clone)]
pub struct RemoteCatalog {
    inner: Arc<RemoteCatalogInner>,
}

struct RemoteCatalogInner {
    client: reqwest::Client,
    endpoint: Url,
    cache: TransientCache,
    ttl: Duration,
}

impl RemoteCatalog {
    /// Create a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `RemoteCatalogError::Http` if the HTTP client cannot be built.
    pub fn new(
        config: &RemoteCatalogConfig,
        cache: TransientCache,
        ttl: Duration,
    ) -> Result<Self, RemoteCatalogError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            inner: Arc::new(RemoteCatalogInner {
                client,
                endpoint: config.endpoint.clone(),
                cache,
                ttl,
            }),
        })
    }

    /// The endpoint products are fetched from.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Get the product list.
    ///
    /// Unless `force_refresh` is set, a cached list is returned without any
    /// network traffic. Fetch and decode failures yield an empty list and are
    /// not cached; every successful decode is, even an empty one.
    #[instrument(skip(self), fields(endpoint = %self.inner.endpoint))]
    pub async fn fetch_products(&self, force_refresh: bool) -> Arc<Vec<ExternalProduct>> {
        if !force_refresh
            && let Some(CacheValue::Products(products)) = self.inner.cache.get(PRODUCTS_KEY).await
        {
            debug!(count = products.len(), "Cache hit for remote catalog");
            return products;
        }

        let products = match self.try_fetch().await {
            Ok(products) => Arc::new(products),
            Err(e) => {
                warn!(error = %e, "Remote catalog fetch failed, using empty list");
                return Arc::new(Vec::new());
            }
        };

        self.inner
            .cache
            .set(
                PRODUCTS_KEY,
                CacheValue::Products(Arc::clone(&products)),
                self.inner.ttl,
            )
            .await;

        products
    }

    /// Drop the cached product list.
    pub async fn invalidate(&self) {
        self.inner.cache.delete(PRODUCTS_KEY).await;
    }

    async fn try_fetch(&self) -> Result<Vec<ExternalProduct>, RemoteCatalogError> {
        let response = self
            .inner
            .client
            .get(self.inner.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                status = %status,
                body = %excerpt(&body),
                "Remote catalog returned non-success status"
            );
            return Err(RemoteCatalogError::Status { status });
        }

        decode_products(&body).inspect_err(|e| {
            warn!(error = %e, body = %excerpt(&body), "Failed to decode remote catalog");
        })
    }
}

/// Decode a catalog body, skipping elements that fail validation.
///
/// # Errors
///
/// Returns an error if the body is not JSON or not a JSON array.
pub fn decode_products(body: &str) -> Result<Vec<ExternalProduct>, RemoteCatalogError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let serde_json::Value::Array(items) = value else {
        return Err(RemoteCatalogError::NotAList(json_kind(&value)));
    };

    let products = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let product = serde_json::from_value::<RawProduct>(item)
                .map_err(|e| e.to_string())
                .and_then(|raw| ExternalProduct::try_from(raw).map_err(|e| e.to_string()));

            match product {
                Ok(product) => Some(product),
                Err(reason) => {
                    warn!(index, reason = %reason, "Skipping malformed remote product");
                    None
                }
            }
        })
        .collect();

    Ok(products)
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(500).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    use super::*;

    const CATALOG: &str = r#"[
        {"id": 1, "title": "Backpack", "price": 109.95, "description": "bag",
         "image": "https://img.test/1.jpg", "category": "bags"},
        {"id": 2, "title": "T-Shirt", "price": "22.3", "description": "shirt",
         "image": "https://img.test/2.jpg"}
    ]"#;

    /// Serve `body` with `status` on `/products`, counting hits.
    async fn upstream(status: StatusCode, body: &'static str) -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/products",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        (Url::parse(&format!("http://{addr}/products")).unwrap(), hits)
    }

    fn client(endpoint: Url) -> RemoteCatalog {
        let config = RemoteCatalogConfig {
            endpoint,
            ..RemoteCatalogConfig::default()
        };
        RemoteCatalog::new(&config, TransientCache::default(), Duration::from_secs(900)).unwrap()
    }

    #[tokio::test]
    async fn test_cached_list_skips_network() {
        let (endpoint, hits) = upstream(StatusCode::OK, CATALOG).await;
        let remote = client(endpoint);

        assert_eq!(remote.fetch_products(false).await.len(), 2);
        assert_eq!(remote.fetch_products(false).await.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_refetches() {
        let (endpoint, hits) = upstream(StatusCode::OK, CATALOG).await;
        let remote = client(endpoint);

        remote.fetch_products(false).await;
        remote.fetch_products(true).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_drops_cached_list() {
        let (endpoint, hits) = upstream(StatusCode::OK, CATALOG).await;
        let remote = client(endpoint);

        remote.fetch_products(false).await;
        remote.invalidate().await;
        remote.fetch_products(false).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_success_status_yields_empty_list() {
        let (endpoint, _) = upstream(StatusCode::INTERNAL_SERVER_ERROR, CATALOG).await;
        assert!(client(endpoint).fetch_products(false).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_yields_empty_list() {
        let (endpoint, _) = upstream(StatusCode::OK, "{not json").await;
        assert!(client(endpoint).fetch_products(false).await.is_empty());
    }

    #[tokio::test]
    async fn test_successful_empty_list_is_cached() {
        let (endpoint, hits) = upstream(StatusCode::OK, "[]").await;
        let remote = client(endpoint);

        for _ in 0..3 {
            assert!(remote.fetch_products(false).await.is_empty());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let (endpoint, hits) = upstream(StatusCode::BAD_GATEWAY, CATALOG).await;
        let remote = client(endpoint);

        remote.fetch_products(false).await;
        remote.fetch_products(false).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_empty_list() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = client(Url::parse(&format!("http://{addr}/products")).unwrap());
        assert!(remote.fetch_products(false).await.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_list() {
        assert!(matches!(
            decode_products(r#"{"id": 1}"#),
            Err(RemoteCatalogError::NotAList("object"))
        ));
    }

    #[test]
    fn test_decode_skips_malformed_elements() {
        let products = decode_products(
            r#"[{"id": 1, "title": "ok", "price": 1}, {"title": "no id", "price": 2}, 7]"#,
        )
        .unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products.first().map(|p| p.id), Some(1));
    }
}
