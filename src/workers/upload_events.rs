use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::FieldTable;
use tracing::{error, info, warn};

use crate::modules::ingest::events::UploadNotification;
use crate::modules::ingest::service::IngestService;
use crate::state::AppState;

/// Consumes bucket notifications published to an AMQP queue (MinIO's AMQP
/// target) and handles them one delivery at a time.
pub async fn start_upload_event_worker(state: AppState, queue_name: String) -> anyhow::Result<()> {
    info!("Starting upload event worker...");

    let channel = state.mq.declare_queue(&queue_name).await?;
    let mut consumer = channel
        .basic_consume(
            &queue_name,
            "upload_event_worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!("Upload event worker listening on '{}'", queue_name);

    let service = IngestService::new(&state.storage, &state.jobs, &state.config.pipeline_id);

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                warn!("Consumer error on '{}': {}", queue_name, e);
                continue;
            }
        };

        match serde_json::from_slice::<UploadNotification>(&delivery.data) {
            Ok(notification) => match service.handle_notification(&notification).await {
                Ok(outcomes) => {
                    for outcome in &outcomes {
                        info!(content_id = %outcome.content_id, job_id = %outcome.job_id, "upload processed");
                    }
                }
                Err(e) => error!(error = %e, "upload event failed"),
            },
            Err(e) => error!("Failed to parse upload notification: {}", e),
        }

        // Failures are terminal for the event; redelivering would submit the
        // job a second time.
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!("Failed to ack message: {}", e);
        }
    }

    warn!("Upload event consumer on '{}' ended", queue_name);
    Ok(())
}
