use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;

use crate::state::AppState;

pub mod handler;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(handler::upload_video))
        .layer(DefaultBodyLimit::disable())
}
