use utoipa::OpenApi;

use crate::modules::ingest::service::IngestOutcome;
use crate::modules::playback::handler::SelectContentRequest;
use crate::modules::playback::state::{Advisory, PlaybackSnapshot};
use crate::modules::upload::handler::UploadResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::content::handler::list_contents,
        crate::modules::content::stream_handler::stream_asset,
        crate::modules::ingest::handler::upload_event,
        crate::modules::playback::handler::get_playback,
        crate::modules::playback::handler::select_content,
        crate::modules::playback::handler::resume_auto_play,
        crate::modules::upload::handler::upload_video,
    ),
    components(
        schemas(
            IngestOutcome,
            PlaybackSnapshot, Advisory, SelectContentRequest,
            UploadResponse,
        )
    ),
    tags(
        (name = "Content", description = "Content index and hosted assets"),
        (name = "Ingest", description = "Upload notifications and transcode job submission"),
        (name = "Playback", description = "Auto-play session following the content index"),
        (name = "Upload", description = "Source video uploads")
    )
)]
pub struct ApiDoc;
