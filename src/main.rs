use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use crate::config::settings::AppConfig;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::playback::player::ManifestPlayer;
use crate::modules::playback::poller::{self, PlaybackHandle, Poller};
use crate::state::AppState;

fn start_playback(config: &AppConfig, storage: &StorageService) -> PlaybackHandle {
    let store = Arc::new(storage.clone());
    let (events_tx, events_rx) = async_channel::unbounded();
    let player = ManifestPlayer::new(Arc::clone(&store), &config.hosting_bucket, events_tx);
    let poller = Poller::new(store, &config.hosting_bucket, player);

    poller::spawn(poller, events_rx, config.poll_interval())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting server...");

    let config = AppConfig::new()?;
    let storage = StorageService::new(&config);

    let mq = RabbitMqService::new(&config.rabbitmq_url);
    if let Err(e) = mq.channel().await {
        // publishing reconnects on demand
        warn!(error = %e, "RabbitMQ not reachable at startup");
    }

    let playback = config
        .playback_enabled
        .then(|| start_playback(&config, &storage));

    let port = config.server_port;
    let upload_events_queue = config.upload_events_queue.clone();
    let state = AppState::new(config, storage, mq, playback);

    if let Some(queue) = upload_events_queue {
        let worker_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = workers::upload_events::start_upload_event_worker(worker_state, queue).await {
                error!(error = %e, "upload event worker stopped");
            }
        });
    }

    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
