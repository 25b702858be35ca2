use crate::config::settings::AppConfig;
use crate::infrastructure::queue::rabbitmq::{RabbitMqService, TranscodeQueue};
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::playback::poller::PlaybackHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: StorageService,
    pub mq: RabbitMqService,
    pub jobs: TranscodeQueue,
    /// `None` when the playback session is disabled.
    pub playback: Option<PlaybackHandle>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: StorageService,
        mq: RabbitMqService,
        playback: Option<PlaybackHandle>,
    ) -> Self {
        let jobs = TranscodeQueue::new(mq.clone(), &config.transcode_queue);
        Self {
            config,
            storage,
            mq,
            jobs,
            playback,
        }
    }
}
