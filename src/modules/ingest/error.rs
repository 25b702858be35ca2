use axum::http::StatusCode;
use thiserror::Error;

use crate::infrastructure::storage::StorageError;
use crate::modules::content::maintainer::IndexError;

/// Terminal failures of one upload-event invocation. Nothing here is retried;
/// a failed index update never rolls back the job that was already submitted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid upload notification: {0}")]
    InvalidEvent(String),

    #[error("error fetching object metadata for {bucket}/{key}: {source}")]
    MetadataFetch {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("transcode job submission failed for {content_id}: {source:#}")]
    JobSubmission {
        content_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}
