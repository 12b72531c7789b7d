//! Offline scenarios
//!
//! A v1.0.0 deployment is replaced by v2.0.0; navigation and asset requests
//! are then issued with the network up and down.

use integration_tests::{html, Site, SCOPE};
use offline_cache::{CacheStorage, FetchHandler, FetchRequest, FetchResponse, RequestKey};

async fn upgraded_site() -> (Site, offline_cache::CacheController) {
    let site = Site::new();
    let v1 = site.deploy("v1.0.0");
    v1.start().await.expect("v1.0.0 activates");

    let v2 = site.deploy("v2.0.0");
    let installed = v2.install().await.expect("v2.0.0 installs");
    assert_eq!(installed.cached, 3);
    assert_eq!(
        site.registry.storage().entries("v2.0.0").await.unwrap().len(),
        3
    );

    v2.activate().await.expect("v2.0.0 activates");
    site.network.reset_calls();
    (site, v2)
}

#[tokio::test]
async fn test_upgrade_deletes_previous_generation() {
    let site = Site::new();
    let v1 = site.deploy("v1.0.0");
    v1.start().await.unwrap();
    assert_eq!(site.registry.storage().entries("v1.0.0").await.unwrap().len(), 3);

    let v2 = site.deploy("v2.0.0");
    v2.install().await.unwrap();
    let activated = v2.activate().await.unwrap();

    assert_eq!(activated.deleted, vec!["v1.0.0".to_string()]);
    let storage = site.registry.storage();
    assert_eq!(storage.keys().await.unwrap(), vec!["v2.0.0".to_string()]);
    assert_eq!(storage.entries("v2.0.0").await.unwrap().len(), 3);
    assert_eq!(site.registry.current().as_deref(), Some("v2.0.0"));
}

#[tokio::test]
async fn test_online_navigation_overwrites_shell_entry() {
    let (site, v2) = upgraded_site().await;
    site.network
        .route("https://hub.example/", html("<main>fresh root</main>"));

    let outcome = v2.handle(FetchRequest::navigate("https://hub.example/")).await;
    let response = outcome.response().expect("navigation is answered");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<main>fresh root</main>".to_vec());
    assert_eq!(site.network.call_count(), 1);

    v2.settle().await;
    let shell = site
        .registry
        .storage()
        .get("v2.0.0", &RequestKey::get("https://hub.example/index.html"))
        .await
        .unwrap()
        .expect("shell entry exists");
    assert_eq!(shell.body, b"<main>fresh root</main>".to_vec());
}

#[tokio::test]
async fn test_offline_navigation_returns_stored_shell_verbatim() {
    let (site, v2) = upgraded_site().await;
    let stored = site
        .registry
        .lookup(v2.shell_key())
        .await
        .unwrap()
        .expect("shell cached at install");

    site.network.set_online(false);
    let outcome = v2.handle(FetchRequest::navigate("https://hub.example/")).await;
    assert_eq!(outcome.response(), Some(&stored));
}

#[tokio::test]
async fn test_offline_navigation_after_refresh_serves_refreshed_shell() {
    let (site, v2) = upgraded_site().await;
    site.network
        .route("https://hub.example/", html("<main>refreshed</main>"));
    v2.handle(FetchRequest::navigate("https://hub.example/")).await;
    v2.settle().await;

    site.network.set_online(false);
    let outcome = v2
        .handle(FetchRequest::navigate("https://hub.example/orders"))
        .await;
    assert_eq!(
        outcome.response().unwrap().body,
        b"<main>refreshed</main>".to_vec()
    );
}

#[tokio::test]
async fn test_cached_asset_served_without_network() {
    let (site, v2) = upgraded_site().await;
    let outcome = v2
        .handle(FetchRequest::get("https://hub.example/manifest.webmanifest"))
        .await;
    assert_eq!(
        outcome.response().unwrap().body,
        br#"{"name":"Hub"}"#.to_vec()
    );
    assert_eq!(site.network.call_count(), 0);
}

#[tokio::test]
async fn test_cross_origin_request_untouched() {
    let (site, v2) = upgraded_site().await;
    let before = site.registry.storage().entries("v2.0.0").await.unwrap();

    let outcome = v2
        .handle(FetchRequest::get("https://analytics.example/collect?e=view"))
        .await;
    assert!(outcome.is_passthrough());

    v2.settle().await;
    assert_eq!(site.network.call_count(), 0);
    assert_eq!(
        site.registry.storage().entries("v2.0.0").await.unwrap(),
        before
    );
}

#[tokio::test]
async fn test_runtime_asset_is_cached_then_served_offline() {
    let (site, v2) = upgraded_site().await;
    site.network.route(
        "https://hub.example/reports.js",
        FetchResponse::new(200, "export const r = 1;"),
    );

    v2.handle(FetchRequest::get("https://hub.example/reports.js")).await;
    v2.settle().await;
    site.network.set_online(false);

    let outcome = v2
        .handle(FetchRequest::get("https://hub.example/reports.js"))
        .await;
    assert_eq!(
        outcome.response().unwrap().body,
        b"export const r = 1;".to_vec()
    );
}

#[tokio::test]
async fn test_uncached_asset_offline_is_network_error() {
    let (site, v2) = upgraded_site().await;
    site.network.set_online(false);

    let outcome = v2
        .handle(FetchRequest::get(format!("{}never-seen.css", SCOPE)))
        .await;
    assert!(outcome.response().unwrap().is_error());
}
