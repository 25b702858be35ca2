use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod error;
pub mod handler;
pub mod player;
pub mod poller;
pub mod state;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/playback", get(handler::get_playback))
        .route("/playback/select", post(handler::select_content))
        .route("/playback/resume", post(handler::resume_auto_play))
}
