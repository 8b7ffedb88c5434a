//! Integration tests for the `?sync_products` trigger.

use catalog_bridge_core::UserRole;
use catalog_bridge_integration_tests::{TestContext, TestOptions};

// =============================================================================
// Precondition Tests
// =============================================================================

#[tokio::test]
async fn test_anonymous_sync_is_rejected() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/?sync_products").await;
    assert_eq!(resp.status(), 401);
    assert_eq!(ctx.upstream_hits(), 0);
}

#[tokio::test]
async fn test_customer_sync_is_forbidden() {
    let ctx = TestContext::new().await;
    ctx.create_user("shopper@example.com", UserRole::Customer).await;
    ctx.login("shopper@example.com").await;

    let resp = ctx.get("/?sync_products").await;
    assert_eq!(resp.status(), 403);
    assert_eq!(ctx.upstream_hits(), 0);
}

#[tokio::test]
async fn test_sync_unavailable_without_commerce() {
    let ctx = TestContext::with_options(TestOptions {
        commerce_enabled: false,
        ..TestOptions::default()
    })
    .await;
    ctx.create_user("manager@example.com", UserRole::ShopManager).await;
    ctx.login("manager@example.com").await;

    let resp = ctx.get("/?sync_products").await;
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn test_empty_remote_catalog_fails_sync() {
    let ctx = TestContext::with_options(TestOptions {
        catalog: "[]",
        ..TestOptions::default()
    })
    .await;
    ctx.create_user("manager@example.com", UserRole::ShopManager).await;
    ctx.login("manager@example.com").await;

    let resp = ctx.get("/?sync_products").await;
    assert_eq!(resp.status(), 502);
}

// =============================================================================
// Sync Flow Tests
// =============================================================================

#[tokio::test]
async fn test_manager_sync_creates_records_and_fills_grid() {
    let ctx = TestContext::new().await;
    ctx.create_user("manager@example.com", UserRole::ShopManager).await;

    let login = ctx.login("manager@example.com").await;
    assert_eq!(login.status(), 303);

    // Render once so a stale grid is cached before the sync.
    let before = ctx.get("/catalog/grid").await.text().await.unwrap();
    assert!(!before.contains("api-product-card"));

    let resp = ctx.get("/catalog/grid?sync_products=1").await;
    assert_eq!(resp.status(), 200);
    let report = resp.text().await.unwrap();
    assert!(report.starts_with("Products synced"), "{report}");

    let after = ctx.get("/catalog/grid").await.text().await.unwrap();
    assert_eq!(after.matches("api-product-card").count(), 2);
    assert!(after.contains("/products/backpack-1"));
    assert!(after.contains("$109.95"));
    assert!(after.contains("/media/"));
}

#[tokio::test]
async fn test_shared_image_is_downloaded_once() {
    let ctx = TestContext::new().await;
    ctx.create_user("admin@example.com", UserRole::Administrator).await;
    ctx.login("admin@example.com").await;

    assert_eq!(ctx.get("/?sync_products").await.status(), 200);

    assert_eq!(ctx.fetcher.calls(), 1);
    let files = std::fs::read_dir(ctx.media_dir()).unwrap().count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn test_repeated_sync_creates_no_duplicates() {
    let ctx = TestContext::new().await;
    ctx.create_user("manager@example.com", UserRole::ShopManager).await;
    ctx.login("manager@example.com").await;

    ctx.get("/?sync_products").await;
    let second = ctx.get("/?sync_products").await.text().await.unwrap();

    assert!(second.contains("0 created"), "{second}");
    let html = ctx.get("/catalog/grid").await.text().await.unwrap();
    assert_eq!(html.matches("api-product-card").count(), 2);
    assert_eq!(ctx.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_logout_revokes_sync() {
    let ctx = TestContext::new().await;
    ctx.create_user("manager@example.com", UserRole::ShopManager).await;
    ctx.login("manager@example.com").await;

    let resp = ctx
        .client
        .post(ctx.url("/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 303);

    assert_eq!(ctx.get("/?sync_products").await.status(), 401);
}

#[tokio::test]
async fn test_demoted_manager_loses_sync_without_relogin() {
    let ctx = TestContext::new().await;
    ctx.create_user("manager@example.com", UserRole::ShopManager).await;
    ctx.login("manager@example.com").await;

    ctx.state
        .auth()
        .change_role("manager@example.com", UserRole::Customer)
        .await
        .unwrap();

    assert_eq!(ctx.get("/?sync_products").await.status(), 403);
    assert_eq!(ctx.upstream_hits(), 0);
}

#[tokio::test]
async fn test_promoted_customer_gains_sync_without_relogin() {
    let ctx = TestContext::new().await;
    ctx.create_user("shopper@example.com", UserRole::Customer).await;
    ctx.login("shopper@example.com").await;
    assert_eq!(ctx.get("/?sync_products").await.status(), 403);

    ctx.state
        .auth()
        .change_role("shopper@example.com", UserRole::ShopManager)
        .await
        .unwrap();

    assert_eq!(ctx.get("/?sync_products").await.status(), 200);
}

// =============================================================================
// Session Cookie Tests
// =============================================================================

#[tokio::test]
async fn test_unsigned_session_cookie_is_anonymous() {
    let ctx = TestContext::new().await;
    ctx.create_user("manager@example.com", UserRole::ShopManager).await;

    let login = ctx.login("manager@example.com").await;
    let set_cookie = login
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let (name, signed) = set_cookie
        .split(';')
        .next()
        .unwrap()
        .split_once('=')
        .unwrap();
    assert_eq!(name, "catalog_session");

    // Signed values are a 44 character digest followed by the session id.
    let bare_id = signed.get(44..).unwrap();
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let sync_with = |value: String| {
        client
            .get(ctx.url("/?sync_products"))
            .header("cookie", format!("catalog_session={value}"))
            .send()
    };

    assert_eq!(sync_with(bare_id.to_string()).await.unwrap().status(), 401);
    assert_eq!(sync_with(signed.to_string()).await.unwrap().status(), 200);
}
