use std::sync::Arc;

use anyhow::{Result, anyhow};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, options::*, types::FieldTable,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::modules::ingest::job::{JobHandle, JobSubmitter, TranscodeJob};

/// AMQP link that connects on first use and reconnects after a failed
/// operation.
#[derive(Clone)]
pub struct RabbitMqService {
    url: String,
    link: Arc<Mutex<Option<(Connection, Channel)>>>,
}

impl RabbitMqService {
    async fn connect(url: &str) -> Result<(Connection, Channel)> {
        info!("Connecting to RabbitMQ at {}", url);
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| anyhow!("Failed to create channel: {}", e))?;

        info!("Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            link: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn channel(&self) -> Result<Channel> {
        let mut link = self.link.lock().await;
        if let Some((_, channel)) = link.as_ref() {
            if channel.status().connected() {
                return Ok(channel.clone());
            }
            warn!("RabbitMQ channel dropped, reconnecting...");
        }

        let (conn, channel) = Self::connect(&self.url).await?;
        *link = Some((conn, channel.clone()));
        Ok(channel)
    }

    async fn invalidate(&self) {
        *self.link.lock().await = None;
    }

    pub async fn declare_queue(&self, queue: &str) -> Result<Channel> {
        let channel = self.channel().await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue, e))?;

        Ok(channel)
    }

    async fn publish_internal(&self, queue: &str, payload: &[u8], properties: BasicProperties) -> Result<()> {
        let channel = self.declare_queue(queue).await?;

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                properties.with_delivery_mode(2), // Persistent
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message: {}", e))?
            .await
            .map_err(|e| anyhow!("Failed to confirm publication: {}", e))?;

        Ok(())
    }

    /// A failed publish is reported, not retried; the next call reconnects.
    pub async fn publish(&self, queue: &str, payload: &[u8], properties: BasicProperties) -> Result<()> {
        if let Err(e) = self.publish_internal(queue, payload, properties).await {
            warn!("RabbitMQ publish to {} failed: {}", queue, e);
            self.invalidate().await;
            return Err(e);
        }

        Ok(())
    }
}

/// Submits transcode jobs by publishing them to the transcoder's work queue.
#[derive(Clone)]
pub struct TranscodeQueue {
    mq: RabbitMqService,
    queue: String,
}

impl TranscodeQueue {
    pub fn new(mq: RabbitMqService, queue: &str) -> Self {
        Self {
            mq,
            queue: queue.to_string(),
        }
    }
}

impl JobSubmitter for TranscodeQueue {
    async fn submit(&self, job: &TranscodeJob) -> Result<JobHandle> {
        let handle = JobHandle(Uuid::new_v4());
        let payload = serde_json::to_vec(job)?;
        let properties = BasicProperties::default()
            .with_message_id(handle.to_string().into())
            .with_content_type(mime::APPLICATION_JSON.to_string().into());

        self.mq.publish(&self.queue, &payload, properties).await?;
        info!(job_id = %handle, queue = %self.queue, "transcode job published");
        Ok(handle)
    }
}
