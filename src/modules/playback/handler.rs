use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::poller::PlaybackHandle;
use super::state::PlaybackSnapshot;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::content::index::ContentId;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SelectContentRequest {
    #[validate(length(min = 1, max = 256))]
    pub content_id: String,
}

fn session(state: &AppState) -> Result<&PlaybackHandle, ApiError> {
    state.playback.as_ref().ok_or_else(|| {
        ApiError(
            "Playback session is disabled".to_string(),
            StatusCode::SERVICE_UNAVAILABLE,
        )
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/playback",
    responses(
        (status = 200, description = "Current playback state", body = ApiResponse<PlaybackSnapshot>),
        (status = 503, description = "Playback session disabled")
    ),
    tag = "Playback"
)]
pub async fn get_playback(State(state): State<AppState>) -> impl IntoResponse {
    match session(&state) {
        Ok(handle) => ApiSuccess(
            ApiResponse::success(handle.snapshot(), "Playback state retrieved"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/playback/select",
    request_body = SelectContentRequest,
    responses(
        (status = 202, description = "Loading the selected content", body = ApiResponse<PlaybackSnapshot>),
        (status = 400, description = "Invalid content id"),
        (status = 404, description = "Content not available yet"),
        (status = 503, description = "Playback session disabled")
    ),
    tag = "Playback"
)]
pub async fn select_content(
    State(state): State<AppState>,
    Json(req): Json<SelectContentRequest>,
) -> impl IntoResponse {
    let handle = match session(&state) {
        Ok(h) => h,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = req.validate() {
        return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }
    let id = match ContentId::new(req.content_id) {
        Ok(id) => id,
        Err(e) => return ApiError(e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    };

    match handle.select(id).await {
        Ok(_) => ApiSuccess(
            ApiResponse::success(handle.snapshot(), "Loading selected content"),
            StatusCode::ACCEPTED,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/playback/resume",
    responses(
        (status = 200, description = "Auto-play re-enabled", body = ApiResponse<PlaybackSnapshot>),
        (status = 503, description = "Playback session disabled")
    ),
    tag = "Playback"
)]
pub async fn resume_auto_play(State(state): State<AppState>) -> impl IntoResponse {
    let handle = match session(&state) {
        Ok(h) => h,
        Err(e) => return e.into_response(),
    };

    match handle.resume().await {
        Ok(()) => ApiSuccess(
            ApiResponse::success(handle.snapshot(), "Auto-play resumed"),
            StatusCode::OK,
        )
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::settings::AppConfig;
    use crate::infrastructure::queue::rabbitmq::RabbitMqService;
    use crate::infrastructure::storage::memory::MemoryStore;
    use crate::infrastructure::storage::s3::StorageService;
    use crate::modules::content::index::INDEX_KEY;
    use crate::modules::playback::player::ManifestPlayer;
    use crate::modules::playback::poller::{self, Poller};
    use crate::state::AppState;

    const BUCKET: &str = "video-hosting-test";

    fn config() -> AppConfig {
        AppConfig {
            server_port: 0,
            storage_endpoint: Some("http://127.0.0.1:9".to_string()),
            storage_region: "us-east-1".to_string(),
            storage_access_key: "test".to_string(),
            storage_secret_key: "test".to_string(),
            userfiles_bucket: "video-userfiles-test".to_string(),
            hosting_bucket: BUCKET.to_string(),
            rabbitmq_url: "amqp://127.0.0.1:9/%2f".to_string(),
            transcode_queue: "transcoding_tasks".to_string(),
            pipeline_id: "pipe-test".to_string(),
            upload_events_queue: None,
            poll_interval_secs: 3600,
            playback_enabled: true,
        }
    }

    fn app(store: Option<Arc<MemoryStore>>) -> axum::Router {
        let config = config();
        let mq = RabbitMqService::new(&config.rabbitmq_url);
        let playback = store.map(|store| {
            let (tx, rx) = async_channel::unbounded();
            let player = ManifestPlayer::new(Arc::clone(&store), BUCKET, tx);
            poller::spawn(Poller::new(store, BUCKET, player), rx, Duration::from_secs(3600))
        });
        let storage = StorageService::new(&config);
        crate::app::create_app(AppState::new(config, storage, mq, playback))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn select_request(content_id: &str) -> Request<Body> {
        Request::post("/api/v1/playback/select")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"content_id":"{content_id}"}}"#)))
            .unwrap()
    }

    #[tokio::test]
    async fn disabled_session_is_unavailable() {
        let response = app(None)
            .oneshot(Request::get("/api/v1/playback").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn select_plays_available_content() {
        let store = Arc::new(MemoryStore::default());
        store.insert(BUCKET, INDEX_KEY, r#"["20-b","10-a"]"#);
        store.insert(BUCKET, "content/10-a/default.m3u8", "#EXTM3U\n#EXTINF:5,\n0.ts\n");

        let response = app(Some(store)).oneshot(select_request("10-a")).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["auto_play"], false);
        assert_eq!(body["data"]["loading_id"].as_str().or(body["data"]["playing_id"].as_str()), Some("10-a"));
    }

    #[tokio::test]
    async fn select_of_pending_content_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        store.insert(BUCKET, INDEX_KEY, r#"["20-b"]"#);

        let response = app(Some(store)).oneshot(select_request("20-b")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn select_rejects_path_like_ids() {
        let store = Arc::new(MemoryStore::default());

        let response = app(Some(store)).oneshot(select_request("../etc")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn select_rejects_dot_only_ids() {
        for content_id in [".", ".."] {
            let store = Arc::new(MemoryStore::default());
            store.insert(BUCKET, INDEX_KEY, r#"["20-b"]"#);

            let response = app(Some(store)).oneshot(select_request(content_id)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{content_id}");
        }
    }

    #[tokio::test]
    async fn undecodable_upload_event_is_bad_request() {
        let response = app(None)
            .oneshot(
                Request::post("/api/v1/events/upload")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn asset_paths_with_dot_segments_are_rejected() {
        let response = app(None)
            .oneshot(Request::get("/content/a/../index.json").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
