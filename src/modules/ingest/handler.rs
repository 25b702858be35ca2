use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use tracing::error;

use super::error::IngestError;
use super::events::UploadNotification;
use super::service::{IngestOutcome, IngestService};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::state::AppState;

/// Bucket notification webhook (S3 event notification / MinIO webhook target).
#[utoipa::path(
    post,
    path = "/api/v1/events/upload",
    request_body(content = String, description = "S3 event notification JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Jobs submitted and index updated", body = ApiResponse<Vec<IngestOutcome>>),
        (status = 400, description = "Undecodable notification"),
        (status = 502, description = "Metadata, job submission or index update failed")
    ),
    tag = "Ingest"
)]
pub async fn upload_event(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let notification: UploadNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            let err = IngestError::InvalidEvent(e.to_string());
            return ApiError::from(err).into_response();
        }
    };

    let service = IngestService::new(&state.storage, &state.jobs, &state.config.pipeline_id);
    match service.handle_notification(&notification).await {
        Ok(outcomes) => {
            ApiSuccess(ApiResponse::success(outcomes, "Upload processed"), StatusCode::OK).into_response()
        }
        Err(e) => {
            error!(error = %e, "upload event failed");
            ApiError::from(e).into_response()
        }
    }
}
