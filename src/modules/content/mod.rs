use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod handler;
pub mod index;
pub mod maintainer;
pub mod stream_handler;

pub fn router() -> Router<AppState> {
    Router::new().route("/contents", get(handler::list_contents))
}

/// Asset proxy, mounted at the site root so relative playlist URIs resolve.
pub fn asset_router() -> Router<AppState> {
    Router::new().route("/content/{*path}", get(stream_handler::stream_asset))
}
