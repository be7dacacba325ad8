//! Ingest endpoint: one JSON payload per request from the producer, fanned
//! out to every connected viewer.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use pitwall_core::{expand, parse_body};
use serde_json::json;

use crate::server::AppState;

/// `POST /data`.
///
/// Accepts a single flat vehicle object or a `{timestamp, vehicles: [...]}`
/// batch. A body that fails to parse is a 400 and touches nothing; a parsed
/// body that yields no vehicles is still a success.
pub async fn ingest_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, kind = e.error_kind(), "rejected producer payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": e.to_string()})),
            );
        }
    };

    let messages = expand(payload);
    let received = messages.len();
    for message in &messages {
        state.registry.broadcast(&message.to_string());
    }

    tracing::debug!(
        received_vehicles = received,
        viewers = state.registry.count(),
        "payload relayed"
    );
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "received_vehicles": received,
            "connected_clients": state.registry.count(),
        })),
    )
}
