use offline_cache::{
    CacheController, CacheError, CacheStorage, Clients, ControllerConfig, ControllerState,
    FetchHandler, FetchRequest, FetchResponse, FileCacheStorage, GenerationRegistry, RequestKey,
    StaticNetwork,
};
use std::sync::Arc;
use std::time::Duration;

const SCOPE: &str = "https://hub.example/";

fn html(body: &str) -> FetchResponse {
    FetchResponse::new(200, body).with_header("content-type", "text/html")
}

fn hub_network() -> Arc<StaticNetwork> {
    Arc::new(
        StaticNetwork::new()
            .with_route("https://hub.example/", html("<h1>hub</h1>"))
            .with_route("https://hub.example/index.html", html("<h1>hub</h1>"))
            .with_route(
                "https://hub.example/manifest.webmanifest",
                FetchResponse::new(200, r#"{"name":"hub"}"#),
            )
            .with_route("https://hub.example/icon-192.png", FetchResponse::new(200, "png192"))
            .with_route("https://hub.example/icon-512.png", FetchResponse::new(200, "png512")),
    )
}

fn controller(
    config: ControllerConfig,
    registry: &Arc<GenerationRegistry>,
    network: &Arc<StaticNetwork>,
) -> CacheController {
    CacheController::new(config, Arc::clone(registry), network.clone()).expect("valid config")
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_default_core_assets_are_cached() {
        let registry = Arc::new(GenerationRegistry::in_memory());
        let network = hub_network();
        let ctrl = controller(ControllerConfig::new("arslan-hub-v1.0.0", SCOPE), &registry, &network);

        let installed = ctrl.install().await.expect("install");
        assert_eq!(installed.cached, 5);

        let storage = registry.storage();
        for path in ["", "index.html", "manifest.webmanifest", "icon-192.png", "icon-512.png"] {
            let key = RequestKey::get(&format!("{}{}", SCOPE, path));
            assert!(
                storage.get("arslan-hub-v1.0.0", &key).await.unwrap().is_some(),
                "missing {}",
                key
            );
        }
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_generation() {
        let registry = Arc::new(GenerationRegistry::in_memory());
        let network = hub_network();
        controller(ControllerConfig::new("v1", SCOPE), &registry, &network)
            .start()
            .await
            .expect("v1 starts");

        network.fail("https://hub.example/icon-512.png");
        let v2 = controller(ControllerConfig::new("v2", SCOPE), &registry, &network);
        let result = v2.install().await;

        assert!(matches!(result, Err(CacheError::InstallFailed { .. })));
        assert_eq!(v2.state(), ControllerState::Redundant);
        assert_eq!(registry.current().as_deref(), Some("v1"));
        assert_eq!(registry.storage().keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_install_timeout() {
        let registry = Arc::new(GenerationRegistry::in_memory());
        let network = hub_network();
        network.set_delay(Some(Duration::from_millis(500)));
        let config = ControllerConfig::new("v1", SCOPE).with_install_timeout(Some(Duration::from_millis(20)));
        let ctrl = controller(config, &registry, &network);

        let result = ctrl.install().await;
        assert!(matches!(result, Err(CacheError::InstallTimeout { ref url }) if url == SCOPE));
        assert!(registry.storage().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_old_controller_stops_serving_after_upgrade() {
        let registry = Arc::new(GenerationRegistry::in_memory());
        let network = hub_network();
        let clients = Arc::new(Clients::new());
        clients.open("tab-1");

        let v1 = controller(ControllerConfig::new("v1", SCOPE), &registry, &network)
            .with_clients(Arc::clone(&clients));
        v1.start().await.unwrap();

        let v2 = controller(ControllerConfig::new("v2", SCOPE), &registry, &network)
            .with_clients(Arc::clone(&clients));
        let activated = v2.start().await.unwrap();
        assert_eq!(activated.deleted, vec!["v1".to_string()]);
        assert_eq!(activated.claimed, 1);
        assert_eq!(clients.controller_of("tab-1").as_deref(), Some("v2"));

        let outcome = v1.handle(FetchRequest::get("https://hub.example/index.html")).await;
        assert!(outcome.is_passthrough());
        assert_eq!(v1.state(), ControllerState::Redundant);

        network.reset_calls();
        let outcome = v2.handle(FetchRequest::get("https://hub.example/index.html")).await;
        assert!(outcome.response().unwrap().ok());
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_install_while_serving() {
        let registry = Arc::new(GenerationRegistry::in_memory());
        let network = hub_network();
        let ctrl = controller(ControllerConfig::new("v1", SCOPE), &registry, &network);
        ctrl.start().await.unwrap();

        network.set_online(false);
        assert!(ctrl.install().await.is_err());
        assert_eq!(ctrl.state(), ControllerState::Activated);

        let outcome = ctrl.handle(FetchRequest::navigate(SCOPE)).await;
        assert_eq!(outcome.response().unwrap().body, b"<h1>hub</h1>".to_vec());
    }
}

#[cfg(test)]
mod file_storage_tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let network = hub_network();

        {
            let storage = Arc::new(FileCacheStorage::open_dir(dir.path()).await.unwrap());
            let registry = Arc::new(GenerationRegistry::new(storage));
            let ctrl = controller(ControllerConfig::new("v1", SCOPE), &registry, &network);
            ctrl.start().await.unwrap();
        }

        network.set_online(false);
        let storage = Arc::new(FileCacheStorage::open_dir(dir.path()).await.unwrap());
        let registry = Arc::new(GenerationRegistry::new(storage));
        let ctrl = controller(ControllerConfig::new("v1", SCOPE), &registry, &network);

        assert!(ctrl.resume().await.unwrap());
        let outcome = ctrl.handle(FetchRequest::navigate(SCOPE)).await;
        assert_eq!(outcome.response().unwrap().body, b"<h1>hub</h1>".to_vec());
    }

    #[tokio::test]
    async fn test_background_write_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let network = hub_network();
        network.route("https://hub.example/app.js", FetchResponse::new(200, "console.log(1)"));

        let storage = Arc::new(FileCacheStorage::open_dir(dir.path()).await.unwrap());
        let registry = Arc::new(GenerationRegistry::new(storage));
        let ctrl = controller(ControllerConfig::new("v1", SCOPE), &registry, &network);
        ctrl.start().await.unwrap();

        ctrl.handle(FetchRequest::get("https://hub.example/app.js")).await;
        ctrl.settle().await;

        let reopened = FileCacheStorage::open_dir(dir.path()).await.unwrap();
        let stored = reopened
            .get("v1", &RequestKey::get("https://hub.example/app.js"))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().body, b"console.log(1)".to_vec());
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[tokio::test]
    async fn test_json_config_drives_controller() {
        let config = ControllerConfig::from_json_str(
            r#"{
                "version_id": "hub-v7",
                "scope": "https://hub.example/app/",
                "core_assets": ["./", "./index.html"],
                "shell_document_path": "./index.html"
            }"#,
        )
        .unwrap();

        let network = Arc::new(
            StaticNetwork::new()
                .with_route("https://hub.example/app/", html("app root"))
                .with_route("https://hub.example/app/index.html", html("app shell")),
        );
        let registry = Arc::new(GenerationRegistry::in_memory());
        let ctrl = controller(config, &registry, &network);
        ctrl.start().await.unwrap();

        assert_eq!(ctrl.shell_key().url, "https://hub.example/app/index.html");
        network.set_online(false);
        let outcome = ctrl
            .handle(FetchRequest::navigate("https://hub.example/app/billing"))
            .await;
        assert_eq!(outcome.response().unwrap().body, b"app shell".to_vec());
    }
}
