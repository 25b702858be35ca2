use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    StorageEndpoint,
    StorageRegion,
    StorageAccessKey,
    StorageSecretKey,
    UserfilesBucket,
    HostingBucket,
    RabbitMqUrl,
    TranscodeQueue,
    PipelineId,
    UploadEventsQueue,
    PollIntervalSecs,
    PlaybackEnabled,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::StorageEndpoint => "STORAGE_ENDPOINT",
            EnvKey::StorageRegion => "STORAGE_REGION",
            EnvKey::StorageAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::StorageSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::UserfilesBucket => "USERFILES_BUCKET",
            EnvKey::HostingBucket => "HOSTING_BUCKET",
            EnvKey::RabbitMqUrl => "RABBITMQ_URL",
            EnvKey::TranscodeQueue => "TRANSCODE_QUEUE",
            EnvKey::PipelineId => "PIPELINE_ID",
            EnvKey::UploadEventsQueue => "UPLOAD_EVENTS_QUEUE",
            EnvKey::PollIntervalSecs => "POLL_INTERVAL_SECS",
            EnvKey::PlaybackEnabled => "PLAYBACK_ENABLED",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

/// Unset and blank values both read as `None`.
pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
