use axum::Router;
use axum::routing::post;

use crate::state::AppState;

pub mod error;
pub mod events;
pub mod handler;
pub mod job;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new().route("/events/upload", post(handler::upload_event))
}
