//! Object storage seam.
//!
//! Everything that touches buckets goes through [`ObjectStore`] so the index
//! maintainer and the playback poller can run against [`s3::StorageService`]
//! in production and an in-memory store in tests.

#[cfg(test)]
pub mod memory;
pub mod s3;

use std::collections::HashMap;
use std::future::Future;

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object {0} changed since it was read")]
    PreconditionFailed(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Body and version tag of a fetched object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub e_tag: Option<String>,
}

/// One page of a key listing. When `is_truncated` is set the next page starts
/// after the last key of this one.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
}

/// Optimistic-concurrency guard for a put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    Unconditional,
    /// Only overwrite if the stored version tag still matches.
    IfMatch(String),
    /// Only create; fail if anything exists at the key.
    IfAbsent,
}

pub trait ObjectStore: Send + Sync {
    /// User-defined metadata of an object (HEAD).
    fn head_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = StorageResult<HashMap<String, String>>> + Send;

    fn get(&self, bucket: &str, key: &str) -> impl Future<Output = StorageResult<StoredObject>> + Send;

    fn exists(&self, bucket: &str, key: &str) -> impl Future<Output = StorageResult<bool>> + Send;

    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        condition: WriteCondition,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Keys under `prefix` sorted ascending, resuming strictly after `marker`.
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> impl Future<Output = StorageResult<ObjectPage>> + Send;
}
