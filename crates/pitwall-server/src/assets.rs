//! Static asset boundary: every path that is not `/data` or `/ws` is a
//! document request against the configured root. Deliberately thin.

use std::path::{Component, Path, PathBuf};

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::IntoResponse;

use crate::server::AppState;

/// Fallback handler for the document root.
pub async fn asset_handler(State(state): State<AppState>, uri: Uri) -> impl IntoResponse {
    let Some(path) = resolve(&state.doc_root, uri.path()) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    match tokio::fs::read(&path).await {
        Ok(contents) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type(&path))],
            contents,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "asset read failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

/// Map a request path onto the document root. `/` serves the index; any
/// non-plain component (`..`, absolute prefixes) rejects the request.
fn resolve(doc_root: &Path, request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    let relative = if trimmed.is_empty() { "index.html" } else { trimmed };
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(doc_root.join(relative))
}

/// Extension to content type; anything unrecognized is served as a generic
/// binary blob.
fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
