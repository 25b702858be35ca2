use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::IngestError;
use super::events::{UploadNotification, UploadRecord};
use super::job::{JobSubmitter, build_transcode_request};
use crate::config::settings::hosting_bucket_for;
use crate::infrastructure::storage::ObjectStore;
use crate::modules::content::index::ContentId;
use crate::modules::content::maintainer;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestOutcome {
    pub content_id: String,
    pub job_id: Uuid,
    pub source_key: String,
    pub hosting_bucket: String,
    pub index_entries: usize,
}

/// Turns upload notifications into transcode jobs and index entries.
pub struct IngestService<'a, S, J> {
    store: &'a S,
    jobs: &'a J,
    pipeline_id: &'a str,
}

impl<'a, S: ObjectStore, J: JobSubmitter> IngestService<'a, S, J> {
    pub fn new(store: &'a S, jobs: &'a J, pipeline_id: &'a str) -> Self {
        Self { store, jobs, pipeline_id }
    }

    /// Records are handled one after another; the first failure ends the
    /// invocation.
    pub async fn handle_notification(
        &self,
        notification: &UploadNotification,
    ) -> Result<Vec<IngestOutcome>, IngestError> {
        if notification.records.is_empty() {
            return Err(IngestError::InvalidEvent("notification has no records".to_string()));
        }

        let mut outcomes = Vec::with_capacity(notification.records.len());
        for record in &notification.records {
            if !record.is_object_created() {
                info!(event = ?record.event_name, "skipping non-upload event");
                continue;
            }
            let outcome = self.handle_record(record, OffsetDateTime::now_utc()).await?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    pub async fn handle_record(
        &self,
        record: &UploadRecord,
        now: OffsetDateTime,
    ) -> Result<IngestOutcome, IngestError> {
        let bucket = record.bucket();
        let key = record.object_key();
        info!(bucket, key = %key, "received upload event");

        let stored = self.store.head_metadata(bucket, &key).await.map_err(|source| {
            error!(bucket, key = %key, error = %source, "error fetching object metadata");
            IngestError::MetadataFetch {
                bucket: bucket.to_string(),
                key: key.clone(),
                source,
            }
        })?;

        let principal = &record.user_identity.principal_id;
        let mut metadata: BTreeMap<String, String> = stored.into_iter().collect();
        metadata.insert("userIp".to_string(), record.request_parameters.source_ip_address.clone());
        metadata.insert("userPrincipal".to_string(), principal.clone());

        let content_id = ContentId::mint(principal, now, &mut rand::rng());
        info!(%content_id, "allocated content id");

        let job = build_transcode_request(&key, &content_id, metadata, self.pipeline_id);
        let handle = self.jobs.submit(&job).await.map_err(|source| {
            error!(%content_id, error = %source, "transcode job submission failed");
            IngestError::JobSubmission {
                content_id: content_id.to_string(),
                source,
            }
        })?;
        info!(%content_id, job_id = %handle, "transcode job submitted");

        let hosting_bucket = hosting_bucket_for(bucket);
        let index = maintainer::register_content(self.store, &hosting_bucket, &content_id)
            .await
            .inspect_err(|e| {
                warn!(%content_id, job_id = %handle, error = %e, "job submitted but index update failed");
            })?;

        Ok(IngestOutcome {
            content_id: content_id.to_string(),
            job_id: handle.0,
            source_key: key,
            hosting_bucket,
            index_entries: index.len(),
        })
    }
}
