use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::env::{self, EnvKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid storage endpoint {0}: {1}")]
    InvalidEndpoint(String, url::ParseError),
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub storage_endpoint: Option<String>,
    pub storage_region: String,
    pub storage_access_key: String,
    pub storage_secret_key: String,
    pub userfiles_bucket: String,
    pub hosting_bucket: String,
    pub rabbitmq_url: String,
    pub transcode_queue: String,
    pub pipeline_id: String,
    pub upload_events_queue: Option<String>,
    pub poll_interval_secs: u64,
    pub playback_enabled: bool,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let storage_endpoint = env::get_opt(EnvKey::StorageEndpoint);
        if let Some(endpoint) = &storage_endpoint {
            Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint(endpoint.clone(), e))?;
        }

        let userfiles_bucket = required(EnvKey::UserfilesBucket)?;
        let hosting_bucket = env::get_opt(EnvKey::HostingBucket)
            .unwrap_or_else(|| hosting_bucket_for(&userfiles_bucket));

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            storage_endpoint,
            storage_region: env::get_or(EnvKey::StorageRegion, "us-east-1"),
            storage_access_key: required(EnvKey::StorageAccessKey)?,
            storage_secret_key: required(EnvKey::StorageSecretKey)?,
            userfiles_bucket,
            hosting_bucket,
            rabbitmq_url: required(EnvKey::RabbitMqUrl)?,
            transcode_queue: env::get_or(EnvKey::TranscodeQueue, "transcoding_tasks"),
            pipeline_id: required(EnvKey::PipelineId)?,
            upload_events_queue: env::get_opt(EnvKey::UploadEventsQueue),
            poll_interval_secs: env::get_parsed(EnvKey::PollIntervalSecs, 10),
            playback_enabled: env::get_parsed(EnvKey::PlaybackEnabled, true),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get_opt(key).ok_or(ConfigError::Missing(name))
}

/// Transcoded output lives in the sibling "hosting" bucket of the bucket
/// users upload into. Only the first `-userfiles-` is rewritten; names without
/// it map to themselves.
pub fn hosting_bucket_for(userfiles_bucket: &str) -> String {
    userfiles_bucket.replacen("-userfiles-", "-hosting-", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosting_bucket_rewrites_first_marker_only() {
        assert_eq!(
            hosting_bucket_for("video-userfiles-mobilehub-123"),
            "video-hosting-mobilehub-123"
        );
        assert_eq!(
            hosting_bucket_for("a-userfiles-b-userfiles-c"),
            "a-hosting-b-userfiles-c"
        );
    }

    #[test]
    fn hosting_bucket_without_marker_is_unchanged() {
        assert_eq!(hosting_bucket_for("plain-bucket"), "plain-bucket");
    }
}
