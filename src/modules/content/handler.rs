use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::error;

use super::index::{ContentIndex, INDEX_KEY};
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::infrastructure::storage::{ObjectStore, StorageError};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/contents",
    responses(
        (status = 200, description = "Content ids, newest first", body = ApiResponse<Vec<String>>),
        (status = 404, description = "Content index not written yet"),
        (status = 500, description = "Stored index is malformed"),
        (status = 502, description = "Storage error")
    ),
    tag = "Content"
)]
pub async fn list_contents(State(state): State<AppState>) -> impl IntoResponse {
    let bucket = &state.config.hosting_bucket;

    match state.storage.get(bucket, INDEX_KEY).await {
        Ok(object) => match ContentIndex::from_json(&object.body) {
            Ok(index) => {
                let message = if index.is_empty() {
                    "Content index is empty"
                } else {
                    "Contents retrieved successfully"
                };
                let ids: Vec<String> = index.newest_first().cloned().collect();
                ApiSuccess(ApiResponse::success(ids, message), StatusCode::OK).into_response()
            }
            Err(e) => {
                error!(bucket = %bucket, error = %e, "stored content index is malformed");
                ApiError(format!("Content index is malformed: {e}"), StatusCode::INTERNAL_SERVER_ERROR)
                    .into_response()
            }
        },
        Err(StorageError::NotFound(_)) => {
            ApiError("Content index is not available".to_string(), StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => {
            error!(bucket = %bucket, error = %e, "failed to read content index");
            ApiError::from(e).into_response()
        }
    }
}
