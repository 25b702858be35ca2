use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::index::{CONTENT_PREFIX, ContentId, ContentIndex, INDEX_KEY};
use crate::infrastructure::storage::{ObjectStore, StorageError, WriteCondition};

/// Read-merge-write rounds before giving up on a contended index.
const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("unable to read content in bucket {bucket}: {source}")]
    Read {
        bucket: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to write {INDEX_KEY} in bucket {bucket}: {source}")]
    Write {
        bucket: String,
        #[source]
        source: StorageError,
    },
}

/// Every key under `content/`, following the listing marker until the
/// provider stops reporting truncation.
pub async fn list_content_keys<S: ObjectStore>(store: &S, bucket: &str) -> Result<Vec<String>, StorageError> {
    let mut keys = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = store.list_page(bucket, CONTENT_PREFIX, marker.as_deref()).await?;
        let truncated = page.is_truncated;
        keys.extend(page.keys);

        if !truncated {
            break;
        }
        match keys.last() {
            Some(last) if marker.as_deref() != Some(last.as_str()) => marker = Some(last.clone()),
            _ => {
                warn!(bucket, "listing reported truncation without progress; stopping");
                break;
            }
        }
    }

    Ok(keys)
}

/// Current index plus the guard that makes overwriting it safe.
async fn read_index<S: ObjectStore>(
    store: &S,
    bucket: &str,
) -> Result<(ContentIndex, WriteCondition), StorageError> {
    match store.get(bucket, INDEX_KEY).await {
        Ok(object) => {
            let index = ContentIndex::from_json(&object.body).unwrap_or_else(|e| {
                warn!(bucket, error = %e, "stored index is malformed; rebuilding from folders");
                ContentIndex::default()
            });
            let condition = object
                .e_tag
                .map_or(WriteCondition::Unconditional, WriteCondition::IfMatch);
            Ok((index, condition))
        }
        Err(StorageError::NotFound(_)) => Ok((ContentIndex::default(), WriteCondition::IfAbsent)),
        Err(e) => Err(e),
    }
}

/// Adds `id` to the bucket's content index.
///
/// The new index is the union of every folder under `content/`, the ids
/// already listed in the index and `id` itself. The overwrite only lands if
/// nobody else rewrote the index since it was read; otherwise the merge is
/// redone on fresh data.
pub async fn register_content<S: ObjectStore>(
    store: &S,
    bucket: &str,
    id: &ContentId,
) -> Result<ContentIndex, IndexError> {
    let read_failure = |source| IndexError::Read { bucket: bucket.to_string(), source };

    let mut attempt = 1;
    loop {
        let keys = list_content_keys(store, bucket).await.map_err(read_failure)?;
        let (existing, condition) = read_index(store, bucket).await.map_err(read_failure)?;

        if existing.contains(id.as_str()) {
            debug!(bucket, content_id = %id, "content already listed in the index");
        }

        let mut index = ContentIndex::default();
        index.extend_from_keys(keys.iter().map(String::as_str));
        index.merge(existing);
        index.insert(id.as_str());

        let body = Bytes::from(index.to_json());
        info!(bucket, content_id = %id, entries = index.len(), attempt, "writing content index");

        match store
            .put(bucket, INDEX_KEY, body, mime::APPLICATION_JSON.as_ref(), condition)
            .await
        {
            Ok(()) => return Ok(index),
            Err(StorageError::PreconditionFailed(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                warn!(bucket, attempt, "content index changed underneath us; merging again");
                attempt += 1;
            }
            Err(source) => {
                return Err(IndexError::Write { bucket: bucket.to_string(), source });
            }
        }
    }
}
