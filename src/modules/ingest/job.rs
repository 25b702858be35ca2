use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::content::index::{ContentId, PLAYLIST_NAME};

pub const SEGMENT_DURATION: &str = "5";
pub const PLAYLIST_FORMAT: &str = "HLSv3";

/// Output key and system preset for each HLS rendition, lowest bitrate first.
pub const RENDITIONS: [(&str, &str); 6] = [
    ("160k", "1351620000001-200060"),
    ("400k", "1351620000001-200050"),
    ("600k", "1351620000001-200040"),
    ("1000k", "1351620000001-200030"),
    ("1500k", "1351620000001-200020"),
    ("2000k", "1351620000001-200010"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscodeJob {
    pub inputs: Vec<JobInput>,
    pub output_key_prefix: String,
    pub outputs: Vec<JobOutput>,
    pub playlists: Vec<JobPlaylist>,
    pub pipeline_id: String,
    pub user_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobInput {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobOutput {
    pub key: String,
    pub preset_id: String,
    pub segment_duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobPlaylist {
    pub format: String,
    pub name: String,
    pub output_keys: Vec<String>,
}

/// Job for one uploaded source. Output lands in the content folder of
/// `content_id`, with the master playlist at `<prefix>default.m3u8`.
pub fn build_transcode_request(
    source_key: &str,
    content_id: &ContentId,
    user_metadata: BTreeMap<String, String>,
    pipeline_id: &str,
) -> TranscodeJob {
    let outputs = RENDITIONS
        .iter()
        .map(|(key, preset)| JobOutput {
            key: key.to_string(),
            preset_id: preset.to_string(),
            segment_duration: SEGMENT_DURATION.to_string(),
        })
        .collect();

    TranscodeJob {
        inputs: vec![JobInput { key: source_key.to_string() }],
        output_key_prefix: content_id.output_prefix(),
        outputs,
        playlists: vec![JobPlaylist {
            format: PLAYLIST_FORMAT.to_string(),
            name: PLAYLIST_NAME.to_string(),
            output_keys: RENDITIONS.iter().map(|(key, _)| key.to_string()).collect(),
        }],
        pipeline_id: pipeline_id.to_string(),
        user_metadata,
    }
}

/// Handle returned by the transcoding service for a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle(pub Uuid);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub trait JobSubmitter: Send + Sync {
    fn submit(&self, job: &TranscodeJob) -> impl Future<Output = anyhow::Result<JobHandle>> + Send;
}
