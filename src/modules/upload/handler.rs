use std::path::Path;

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::stream_to_bucket;
use crate::state::AppState;

pub const IDENTITY_HEADER: &str = "x-user-identity";
const DEFAULT_EXTENSION: &str = "mp4";

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub bucket: String,
    pub key: String,
    pub bytes: u64,
}

/// Keeps the identity to a single path segment.
fn sanitize_identity(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

fn extension_for(file_name: Option<&str>, content_type: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .or_else(|| {
            content_type
                .and_then(mime_guess::get_mime_extensions_str)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// `private/<identity>/<epoch-millis>.<ext>`
pub fn upload_key(identity: &str, at: OffsetDateTime, extension: &str) -> String {
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    format!("private/{}/{millis}.{extension}", sanitize_identity(identity))
}

/// Upload a source video into the user-files bucket.
/// The bucket notification for the stored object starts transcoding.
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    params(
        ("x-user-identity" = Option<String>, Header, description = "Uploader identity, defaults to anonymous")
    ),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Upload stored", body = ApiResponse<UploadResponse>),
        (status = 400, description = "No video field in the request"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Upload"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let identity = headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous");
    let bucket = &state.config.userfiles_bucket;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
        };

        if field.name() != Some("video") {
            continue;
        }

        let extension = extension_for(field.file_name(), field.content_type());
        let key = upload_key(identity, OffsetDateTime::now_utc(), &extension);
        info!(bucket = %bucket, key = %key, "starting video upload");

        return match stream_to_bucket(&state.storage, bucket, field, &key).await {
            Ok(bytes) => {
                info!(bucket = %bucket, key = %key, bytes, "video upload stored");
                ApiSuccess(
                    ApiResponse::success(
                        UploadResponse {
                            bucket: bucket.clone(),
                            key,
                            bytes,
                        },
                        "Video uploaded successfully",
                    ),
                    StatusCode::CREATED,
                )
                .into_response()
            }
            Err(e) => ApiError(format!("Upload failed: {e}"), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response(),
        };
    }

    ApiError(
        "No video field found in multipart request".to_string(),
        StatusCode::BAD_REQUEST,
    )
    .into_response()
}
