//! Integration tests for catalog-bridge.
//!
//! Each [`TestContext`] starts two servers on ephemeral ports: a fake remote
//! catalog serving a fixed JSON body, and the storefront itself running on
//! in-memory repositories with an in-memory session store. No database or
//! network access beyond loopback is needed.
//!
//! ```bash
//! cargo test -p catalog-bridge-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::routing::get;
use secrecy::SecretString;
use tempfile::TempDir;
use url::Url;

use catalog_bridge_core::UserRole;
use catalog_bridge_storefront::config::{
    CacheConfig, RemoteCatalogConfig, StorefrontConfig, SyncConfig,
};
use catalog_bridge_storefront::services::images::{FetchedImage, ImageFetcher, ImportError};
use catalog_bridge_storefront::state::{AppState, Repositories};

/// Two products in the remote catalog's wire format.
pub const CATALOG: &str = r#"[
    {"id": 1, "title": "Backpack", "price": 109.95,
     "description": "Fits 15 inch laptops", "image": "https://img.test/shared.jpg"},
    {"id": 2, "title": "Mens Casual T-Shirt", "price": 22.3,
     "description": "Slim fit", "image": "https://img.test/shared.jpg"}
]"#;

/// Password used for every test account.
pub const PASSWORD: &str = "correct horse battery";

/// Serves a one-pixel PNG for any URL, counting calls.
#[derive(Default)]
pub struct FakeImageFetcher {
    calls: AtomicUsize,
}

impl FakeImageFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeImageFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FetchedImage, ImportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedImage {
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
        })
    }
}

/// Knobs for a test server.
pub struct TestOptions {
    pub catalog: &'static str,
    pub commerce_enabled: bool,
    pub home_content: String,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            catalog: CATALOG,
            commerce_enabled: true,
            home_content: "<h1>Shop</h1>\n[api_products limit=4]".to_string(),
        }
    }
}

/// A running storefront plus its fake upstream.
pub struct TestContext {
    /// Cookie-keeping client that does not follow redirects.
    pub client: reqwest::Client,
    pub base_url: String,
    pub state: AppState,
    pub fetcher: Arc<FakeImageFetcher>,
    pub upstream_hits: Arc<AtomicUsize>,
    media_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let upstream_hits = Arc::new(AtomicUsize::new(0));
        let endpoint = serve_catalog(options.catalog, Arc::clone(&upstream_hits)).await;

        let media_dir = TempDir::new().unwrap();
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://unused"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            session_secret: SecretString::from("integration-test-session-secret-0123456789"),
            remote: RemoteCatalogConfig {
                endpoint,
                ..RemoteCatalogConfig::default()
            },
            cache: CacheConfig::default(),
            sync: SyncConfig {
                commerce_enabled: options.commerce_enabled,
                ..SyncConfig::default()
            },
            media_dir: media_dir.path().to_path_buf(),
            home_content: options.home_content,
            debug: false,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let fetcher = Arc::new(FakeImageFetcher::default());
        let state = AppState::with_fetcher(
            config,
            Repositories::in_memory(),
            Arc::clone(&fetcher) as Arc<dyn ImageFetcher>,
        )
        .unwrap();

        let app = catalog_bridge_storefront::app(
            state.clone(),
            tower_sessions::MemoryStore::default(),
        );
        let addr = spawn(app).await;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            client,
            base_url: format!("http://{addr}"),
            state,
            fetcher,
            upstream_hits,
            media_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// Register an account with [`PASSWORD`].
    pub async fn create_user(&self, email: &str, role: UserRole) {
        self.state
            .auth()
            .register(email, PASSWORD, role)
            .await
            .unwrap();
    }

    /// Sign in through the login form; the session cookie stays in the client.
    pub async fn login(&self, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .form(&[("email", email), ("password", PASSWORD)])
            .send()
            .await
            .unwrap()
    }

    pub fn media_dir(&self) -> &Path {
        self.media_dir.path()
    }

    pub fn upstream_hits(&self) -> usize {
        self.upstream_hits.load(Ordering::SeqCst)
    }
}

async fn serve_catalog(body: &'static str, hits: Arc<AtomicUsize>) -> Url {
    let app = Router::new().route(
        "/products",
        get(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                body
            }
        }),
    );
    let addr = spawn(app).await;
    Url::parse(&format!("http://{addr}/products")).unwrap()
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}
