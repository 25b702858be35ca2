use anyhow::{Result, anyhow};
use aws_sdk_s3::types::CompletedPart;
use axum::{body::Bytes, extract::multipart::Field};
use futures_util::StreamExt;
use tracing::{debug, error, warn};

use crate::infrastructure::storage::s3::StorageService;

// S3 rejects non-final parts under 5 MiB.
const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

/// Buffers a byte stream into S3 multipart parts.
pub struct MultipartUploader<'a> {
    storage: &'a StorageService,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
    part_number: i32,
    buffer: Vec<u8>,
    written: u64,
}

impl<'a> MultipartUploader<'a> {
    pub async fn new(
        storage: &'a StorageService,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<Self> {
        let upload_id = storage
            .create_multipart_upload(bucket, key, content_type)
            .await
            .map_err(|e| anyhow!("Failed to initiate upload of {key}: {e}"))?;

        debug!(bucket, key, upload_id = %upload_id, "multipart upload started");

        Ok(Self {
            storage,
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
            written: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.written += chunk.len() as u64;
        self.buffer.extend_from_slice(&chunk);

        if self.buffer.len() >= MIN_PART_SIZE {
            self.flush_part().await?;
        }
        Ok(())
    }

    async fn flush_part(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let body = Bytes::from(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(MIN_PART_SIZE),
        ));

        let part = self
            .storage
            .upload_part(&self.bucket, &self.key, &self.upload_id, self.part_number, body)
            .await
            .map_err(|e| anyhow!("Failed to upload part {}: {e}", self.part_number))?;

        self.parts.push(part);
        self.part_number += 1;
        Ok(())
    }

    /// Completes the upload and returns the number of bytes written.
    pub async fn finish(mut self) -> Result<u64> {
        self.flush_part().await?;

        if self.parts.is_empty() {
            self.abort().await?;
            return Err(anyhow!("Refusing to store empty object {}", self.key));
        }

        let parts = std::mem::take(&mut self.parts);
        let completed = self
            .storage
            .complete_multipart_upload(&self.bucket, &self.key, &self.upload_id, parts)
            .await;

        match completed {
            Ok(()) => Ok(self.written),
            Err(e) => {
                error!(key = %self.key, error = %e, "completing upload failed, aborting");
                match self.abort().await {
                    Ok(()) => Err(anyhow!("Failed to complete upload (aborted): {e}")),
                    Err(abort) => {
                        warn!(key = %self.key, error = %abort, "abort of multipart upload failed");
                        Err(anyhow!("Failed to complete upload: {e}; {abort}"))
                    }
                }
            }
        }
    }

    pub async fn abort(&self) -> Result<()> {
        self.storage
            .abort_multipart_upload(&self.bucket, &self.key, &self.upload_id)
            .await
            .map_err(|e| anyhow!("Failed to abort upload: {e}"))
    }
}

/// Video uploads only; transcoding anything else would fail downstream.
pub fn is_video(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.type_() == mime::VIDEO)
        .unwrap_or(false)
}

/// Streams one multipart field into `bucket/key`. Returns the bytes written.
pub async fn stream_to_bucket(
    storage: &StorageService,
    bucket: &str,
    mut field: Field<'_>,
    key: &str,
) -> Result<u64> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    if !is_video(&content_type) {
        return Err(anyhow!("Invalid content type {content_type}: only video/* allowed"));
    }

    let mut uploader = MultipartUploader::new(storage, bucket, key, &content_type).await?;

    while let Some(chunk) = field.next().await {
        let outcome = match chunk {
            Ok(chunk) => uploader.write_chunk(chunk).await,
            Err(e) => Err(anyhow!("Upload stream interrupted: {e}")),
        };

        if let Err(e) = outcome {
            error!(key, error = %e, "upload failed, aborting");
            if let Err(abort) = uploader.abort().await {
                warn!(key, error = %abort, "abort of multipart upload failed");
            }
            return Err(e);
        }
    }

    uploader.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;

    fn unreachable_storage() -> StorageService {
        StorageService::new(&AppConfig {
            server_port: 0,
            storage_endpoint: Some("http://127.0.0.1:9".to_string()),
            storage_region: "us-east-1".to_string(),
            storage_access_key: "test".to_string(),
            storage_secret_key: "test".to_string(),
            userfiles_bucket: "video-userfiles-test".to_string(),
            hosting_bucket: "video-hosting-test".to_string(),
            rabbitmq_url: "amqp://127.0.0.1:9/%2f".to_string(),
            transcode_queue: "transcoding_tasks".to_string(),
            pipeline_id: "pipe-test".to_string(),
            upload_events_queue: None,
            poll_interval_secs: 10,
            playback_enabled: false,
        })
    }

    #[tokio::test]
    async fn failed_completion_aborts_the_upload() {
        let storage = unreachable_storage();
        let uploader = MultipartUploader {
            storage: &storage,
            bucket: "video-userfiles-test".to_string(),
            key: "private/alice/1.mp4".to_string(),
            upload_id: "upload-1".to_string(),
            parts: vec![CompletedPart::builder().part_number(1).e_tag("\"p1\"").build()],
            part_number: 2,
            buffer: Vec::new(),
            written: 1,
        };

        let err = uploader.finish().await.unwrap_err().to_string();

        assert!(err.starts_with("Failed to complete upload"), "{err}");
        // the backend is down, so the abort that follows fails too
        assert!(err.contains("Failed to abort upload"), "{err}");
    }

    #[test]
    fn only_video_types_pass() {
        assert!(is_video("video/mp4"));
        assert!(is_video("video/quicktime"));
        assert!(!is_video("image/png"));
        assert!(!is_video("application/octet-stream"));
        assert!(!is_video("not a mime"));
    }
}
