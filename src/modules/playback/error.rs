use axum::http::StatusCode;
use thiserror::Error;

/// Everything that can go wrong while polling or playing. None of it stops
/// the poller; each is shown to the user and the next tick starts fresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("CONTENT INDEX IS NOT AVAILABLE")]
    ContentIndexUnavailable,

    #[error("content index is malformed: {0}")]
    IndexParse(String),

    #[error("content {0} is not available yet")]
    AssetNotYetAvailable(String),

    #[error("ERROR: type = {kind}, details = {details}")]
    PlaybackFatal { kind: String, details: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("playback session is not running")]
    SessionStopped,
}

impl PlaybackError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PlaybackError::ContentIndexUnavailable | PlaybackError::AssetNotYetAvailable(_) => {
                StatusCode::NOT_FOUND
            }
            PlaybackError::SessionStopped => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}
