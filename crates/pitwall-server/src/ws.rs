//! Viewer push channel: WebSocket upgrade plus the per-connection pump.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use pitwall_relay::{ViewerId, ViewerRegistry};
use serde_json::json;
use tokio::sync::mpsc;

use crate::server::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new viewer connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (viewer_id, rx) = state.registry.register();

    // The confirmation frame goes through the same queue as broadcasts, so it
    // is always the first message the viewer sees.
    let welcome = json!({
        "type": "connection",
        "status": "connected",
        "timestamp": Utc::now().to_rfc3339(),
    });
    state.registry.send_to(&viewer_id, welcome.to_string());

    pump_socket(socket, viewer_id, rx, Arc::clone(&state.registry)).await;
}

/// Split the socket and pump until either side ends, then unregister.
async fn pump_socket(
    socket: WebSocket,
    viewer_id: ViewerId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ViewerRegistry>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: queued messages out, plus a periodic ping so an idle viewer's
    // death is noticed between broadcasts.
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(text) => {
                        if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: viewers are not expected to talk; drain and ignore until close.
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if let WsMessage::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&viewer_id);
}
