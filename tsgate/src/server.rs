//! HTTP front door.
//!
//! Two routes, matching the gateway's public contract: the media playlist
//! (which may block until the stream's first segment exists) and the
//! segments it references.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tsgate_hls::StreamRegistry;

const CONTENT_TYPE_M3U8: &str = "application/vnd.apple.mpegurl";
// retained for compatibility with existing deployments; video/mp2t would be
// the conventional choice
const CONTENT_TYPE_TS: &str = "text/vnd.trolltech.linguist; charset=utf-8";

pub fn router(registry: Arc<StreamRegistry>) -> Router {
    Router::new()
        .route("/live.m3u8", get(playlist))
        .route("/{fingerprint}/{sequence}/live.ts", get(segment))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

/// Serve until the listener fails.
pub async fn run(registry: Arc<StreamRegistry>, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "tsgate listening");
    axum::serve(listener, router(registry)).await
}

async fn playlist(
    State(registry): State<Arc<StreamRegistry>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(src) = params.get("src").filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing src query parameter").into_response();
    };

    let playlist = registry.playlist_for(src).await;
    ([(header::CONTENT_TYPE, CONTENT_TYPE_M3U8)], playlist).into_response()
}

async fn segment(
    State(registry): State<Arc<StreamRegistry>>,
    Path((fingerprint, sequence)): Path<(String, String)>,
) -> Response {
    match registry.segment(&fingerprint, &sequence) {
        Some(data) => ([(header::CONTENT_TYPE, CONTENT_TYPE_TS)], data).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
