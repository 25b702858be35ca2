use std::collections::HashMap;

use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::{ObjectPage, ObjectStore, StorageError, StorageResult, StoredObject, WriteCondition};
use crate::config::settings::AppConfig;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
}

impl StorageService {
    pub fn new(config: &AppConfig) -> Self {
        let credentials = Credentials::new(
            &config.storage_access_key,
            &config.storage_secret_key,
            None,
            None,
            "static",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.storage_region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.storage_endpoint {
            // MinIO and friends only speak path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!(
            region = %config.storage_region,
            endpoint = config.storage_endpoint.as_deref().unwrap_or("aws"),
            "S3 client configured"
        );

        Self { client }
    }

    /// Raw GET for streaming responses; `range` is an HTTP Range header value.
    pub async fn open(
        &self,
        bucket: &str,
        key: &str,
        range: Option<String>,
    ) -> StorageResult<GetObjectOutput> {
        self.client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|e| {
                let missing = matches!(&e, SdkError::ServiceError(se) if se.err().is_no_such_key());
                if missing {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(DisplayErrorContext(&e).to_string())
                }
            })
    }

    pub async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(backend)?;

        result
            .upload_id
            .ok_or_else(|| StorageError::Backend(format!("no upload id returned for {key}")))
    }

    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<CompletedPart> {
        let result = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(backend)?;

        Ok(CompletedPart::builder()
            .set_e_tag(result.e_tag)
            .part_number(part_number)
            .build())
    }

    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StorageResult<()> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(backend)?;

        Ok(())
    }

    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(backend)?;

        Ok(())
    }
}

fn backend<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StorageError::Backend(DisplayErrorContext(&err).to_string())
}

impl ObjectStore for StorageService {
    async fn head_metadata(&self, bucket: &str, key: &str) -> StorageResult<HashMap<String, String>> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = matches!(&e, SdkError::ServiceError(se) if se.err().is_not_found());
                if missing {
                    StorageError::NotFound(key.to_string())
                } else {
                    backend(e)
                }
            })?;

        Ok(output.metadata.unwrap_or_default())
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        let output = self.open(bucket, key, None).await?;
        let e_tag = output.e_tag.clone();
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("reading {key}: {e}")))?
            .into_bytes();

        Ok(StoredObject { body, e_tag })
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.head_metadata(bucket, key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        condition: WriteCondition,
    ) -> StorageResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body));

        request = match condition {
            WriteCondition::Unconditional => request,
            WriteCondition::IfMatch(tag) => request.if_match(tag),
            WriteCondition::IfAbsent => request.if_none_match("*"),
        };

        request.send().await.map_err(|e| {
            // 412 from S3, 409 from MinIO when a concurrent conditional write won
            let status = e.raw_response().map(|r| r.status().as_u16());
            if matches!(status, Some(412) | Some(409)) {
                warn!(bucket, key, status, "conditional put rejected");
                StorageError::PreconditionFailed(key.to_string())
            } else {
                backend(e)
            }
        })?;

        debug!(bucket, key, "object written");
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> StorageResult<ObjectPage> {
        let output = self
            .client
            .list_objects()
            .bucket(bucket)
            .prefix(prefix)
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .map_err(backend)?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        Ok(ObjectPage {
            keys,
            is_truncated: output.is_truncated().unwrap_or(false),
        })
    }
}
