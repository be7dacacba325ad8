use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use pitwall_core::RelayError;
use pitwall_relay::{run_replay_feed, run_synthetic_feed, FeedConfig, Recording, ViewerRegistry};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{assets, ingest, ws};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Document root for dashboard assets.
    pub doc_root: PathBuf,
    /// Per-viewer outbound queue depth; a viewer that falls this far behind
    /// is dropped.
    pub max_send_queue: usize,
    /// Whether to run the synthetic demo feed.
    pub synthetic_feed: bool,
    /// Tick interval shared by both demo feeds.
    pub feed_interval: Duration,
    /// Optional JSON-lines recording to replay.
    pub replay_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            doc_root: PathBuf::from("public"),
            max_send_queue: 256,
            synthetic_feed: true,
            feed_interval: Duration::from_secs(3),
            replay_path: None,
        }
    }
}

/// Shared application state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ViewerRegistry>,
    pub doc_root: PathBuf,
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/data", post(ingest::ingest_handler))
        .route("/ws", get(ws::ws_handler))
        .fallback(assets::asset_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Create and start the relay. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, RelayError> {
    let registry = Arc::new(ViewerRegistry::new(config.max_send_queue));

    let mut feeds = Vec::new();
    if config.synthetic_feed {
        feeds.push(run_synthetic_feed(
            Arc::clone(&registry),
            FeedConfig {
                interval: config.feed_interval,
                ..Default::default()
            },
        ));
    }
    if let Some(path) = &config.replay_path {
        match Recording::load(path).await {
            Ok(recording) => {
                feeds.push(run_replay_feed(
                    Arc::clone(&registry),
                    recording,
                    config.feed_interval,
                ));
            }
            // A bad recording disables the replay, never the relay.
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "replay recording not loaded")
            }
        }
    }

    let state = AppState {
        registry: Arc::clone(&registry),
        doc_root: config.doc_root.clone(),
    };
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Listen {
            port: config.port,
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| RelayError::Listen {
        port: config.port,
        source,
    })?;

    tracing::info!(port = local_addr.port(), "pitwall relay listening");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        registry,
        server,
        feeds,
    })
}

/// Handle returned by `start()` — keeps the server and feed tasks alive and
/// aborts them when dropped.
pub struct ServerHandle {
    pub port: u16,
    pub registry: Arc<ViewerRegistry>,
    server: tokio::task::JoinHandle<()>,
    feeds: Vec<tokio::task::JoinHandle<()>>,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.server.abort();
        for feed in &self.feeds {
            feed.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use tokio_tungstenite::tungstenite::Message;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0, // random port
            synthetic_feed: false,
            ..Default::default()
        }
    }

    fn temp_doc_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pitwall-assets-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn build_router_creates_routes() {
        let state = AppState {
            registry: Arc::new(ViewerRegistry::new(32)),
            doc_root: PathBuf::from("public"),
        };
        let _router = build_router(state);
    }

    #[tokio::test]
    async fn server_starts_on_random_port() {
        let handle = start(test_config()).await.unwrap();
        assert!(handle.port > 0);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_and_registry_untouched() {
        let handle = start(test_config()).await.unwrap();
        let (_id, mut rx) = handle.registry.register();

        let url = format!("http://127.0.0.1:{}/data", handle.port);
        let resp = reqwest::Client::new()
            .post(&url)
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().is_some());

        assert_eq!(handle.registry.count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn batch_post_fans_out_to_registered_viewer() {
        let handle = start(test_config()).await.unwrap();
        let (_id, mut rx) = handle.registry.register();

        let url = format!("http://127.0.0.1:{}/data", handle.port);
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&json!({
                "timestamp": "2024-01-01T00:00:00Z",
                "vehicles": [{"vehicle_id": "v1", "speed": 50}],
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["received_vehicles"], 1);
        assert_eq!(body["connected_clients"], 1);

        let message: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(message["timestamp"], "2024-01-01T00:00:00Z");
        assert_eq!(message["vehicle_id"], "v1");
        assert_eq!(message["speed"], 50);
        assert_eq!(message["fuel_consumption"], 0);
        assert_eq!(message["emissions"], 0);
        assert_eq!(message["alignment_score"], 0);
    }

    #[tokio::test]
    async fn non_object_body_is_zero_vehicle_success() {
        let handle = start(test_config()).await.unwrap();

        let url = format!("http://127.0.0.1:{}/data", handle.port);
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&json!([1, 2, 3]))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["received_vehicles"], 0);
    }

    #[tokio::test]
    async fn preflight_gets_permissive_cors() {
        let handle = start(test_config()).await.unwrap();

        let url = format!("http://127.0.0.1:{}/data", handle.port);
        let resp = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, &url)
            .header("Origin", "http://dashboard.example")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn serves_static_assets_from_doc_root() {
        let doc_root = temp_doc_root();
        std::fs::write(doc_root.join("index.html"), "<html>pit</html>").unwrap();

        let handle = start(ServerConfig {
            doc_root: doc_root.clone(),
            ..test_config()
        })
        .await
        .unwrap();

        let base = format!("http://127.0.0.1:{}", handle.port);

        let resp = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(resp.text().await.unwrap(), "<html>pit</html>");

        let resp = reqwest::get(format!("{base}/missing.css")).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn viewer_gets_welcome_then_broadcasts() {
        let handle = start(test_config()).await.unwrap();

        let ws_url = format!("ws://127.0.0.1:{}/ws", handle.port);
        let (mut socket, _) = tokio_tungstenite::connect_async(ws_url.as_str()).await.unwrap();

        // Connection confirmation is always the first frame.
        let welcome = match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str::<serde_json::Value>(text.as_str()).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        };
        assert_eq!(welcome["type"], "connection");
        assert_eq!(welcome["status"], "connected");
        assert!(welcome["timestamp"].as_str().is_some());
        assert_eq!(handle.registry.count(), 1);

        let url = format!("http://127.0.0.1:{}/data", handle.port);
        let resp = reqwest::Client::new()
            .post(&url)
            .json(&json!({"vehicle_id": "v9", "speed": 88}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let relayed = loop {
            match socket.next().await.unwrap().unwrap() {
                Message::Text(text) => {
                    break serde_json::from_str::<serde_json::Value>(text.as_str()).unwrap()
                }
                Message::Ping(_) => continue,
                other => panic!("expected text frame, got {other:?}"),
            }
        };
        assert_eq!(relayed["vehicle_id"], "v9");
        assert_eq!(relayed["speed"], 88);

        socket.close(None).await.ok();
    }

    #[tokio::test]
    async fn viewer_disconnect_unregisters() {
        let handle = start(test_config()).await.unwrap();

        let ws_url = format!("ws://127.0.0.1:{}/ws", handle.port);
        let (mut socket, _) = tokio_tungstenite::connect_async(ws_url.as_str()).await.unwrap();
        let _welcome = socket.next().await.unwrap().unwrap();
        assert_eq!(handle.registry.count(), 1);

        socket.close(None).await.unwrap();
        drop(socket);

        // The pump notices the close and removes the viewer.
        for _ in 0..50 {
            if handle.registry.count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handle.registry.count(), 0);
    }
}
