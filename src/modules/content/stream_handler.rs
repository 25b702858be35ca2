use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::error;

use super::index::CONTENT_PREFIX;
use crate::infrastructure::storage::StorageError;
use crate::state::AppState;

/// Serve a hosting-bucket asset (index, manifests, segments) with Range
/// support, so an HLS player can stream straight through the service.
#[utoipa::path(
    get,
    path = "/content/{path}",
    params(
        ("path" = String, Path, description = "Asset path below content/, e.g. 20-b/default.m3u8")
    ),
    responses(
        (status = 200, description = "Asset"),
        (status = 206, description = "Partial Content"),
        (status = 400, description = "Invalid asset path"),
        (status = 404, description = "Not Found"),
        (status = 502, description = "Storage error")
    ),
    tag = "Content"
)]
pub async fn stream_asset(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    if path.is_empty() || path.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let key = format!("{CONTENT_PREFIX}{path}");

    let range = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let resp = match state.storage.open(&state.config.hosting_bucket, &key, range).await {
        Ok(r) => r,
        Err(StorageError::NotFound(_)) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(key = %key, error = %e, "asset fetch failed");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut builder = Response::builder();

    let content_type = resp
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| mime_guess::from_path(&key).first_or_octet_stream().to_string());
    builder = builder.header(header::CONTENT_TYPE, content_type);

    if let Some(cl) = resp.content_length() {
        builder = builder.header(header::CONTENT_LENGTH, cl);
    }

    if let Some(cr) = resp.content_range() {
        builder = builder
            .header(header::CONTENT_RANGE, cr)
            .status(StatusCode::PARTIAL_CONTENT);
    } else {
        builder = builder
            .header(header::ACCEPT_RANGES, "bytes")
            .status(StatusCode::OK);
    }

    if let Some(et) = resp.e_tag() {
        builder = builder.header(header::ETAG, et);
    }

    // manifests and the index change as transcoding progresses
    if key.ends_with(".m3u8") || key.ends_with(".json") {
        builder = builder.header(header::CACHE_CONTROL, "no-cache");
    }

    let stream = ReaderStream::new(resp.body.into_async_read());

    builder
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
