//! In-memory [`ObjectStore`] for unit tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use bytes::Bytes;

use super::{ObjectPage, ObjectStore, StorageError, StorageResult, StoredObject, WriteCondition};

#[derive(Debug, Clone)]
struct Entry {
    body: Bytes,
    version: u64,
    metadata: HashMap<String, String>,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<(String, String), Entry>,
    next_version: u64,
    list_calls: usize,
    /// Writes applied one per conditional put, right before it, simulating a
    /// concurrent writer that sneaks in between read and write.
    interleaved: VecDeque<(String, String, Bytes)>,
    /// Conditional puts still to be rejected outright.
    conflicts: usize,
    conditional_puts: usize,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    page_size: usize,
    pub fail_list: bool,
    pub fail_put: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_page_size(1000)
    }
}

impl MemoryStore {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_size: page_size.max(1),
            fail_list: false,
            fail_put: false,
        }
    }

    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.insert_with_metadata(bucket, key, body, HashMap::new());
    }

    pub fn insert_with_metadata(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<Bytes>,
        metadata: HashMap<String, String>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_version += 1;
        let version = inner.next_version;
        inner.objects.insert(
            (bucket.to_string(), key.to_string()),
            Entry { body: body.into(), version, metadata },
        );
    }

    pub fn body(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|e| e.body.clone())
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }

    pub fn interleave_write(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .interleaved
            .push_back((bucket.to_string(), key.to_string(), body.into()));
    }

    /// Rejects the next `count` conditional puts with `PreconditionFailed`.
    pub fn conflict_next_writes(&self, count: usize) {
        self.inner.lock().unwrap().conflicts = count;
    }

    pub fn conditional_puts(&self) -> usize {
        self.inner.lock().unwrap().conditional_puts
    }
}

impl ObjectStore for MemoryStore {
    async fn head_metadata(&self, bucket: &str, key: &str) -> StorageResult<HashMap<String, String>> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|e| e.metadata.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        let inner = self.inner.lock().unwrap();
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|e| StoredObject {
                body: e.body.clone(),
                e_tag: Some(format!("\"v{}\"", e.version)),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .objects
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
        condition: WriteCondition,
    ) -> StorageResult<()> {
        if self.fail_put {
            return Err(StorageError::Backend("put refused".into()));
        }

        let mut inner = self.inner.lock().unwrap();
        if condition != WriteCondition::Unconditional {
            inner.conditional_puts += 1;
            if let Some((b, k, body)) = inner.interleaved.pop_front() {
                inner.next_version += 1;
                let version = inner.next_version;
                inner
                    .objects
                    .insert((b, k), Entry { body, version, metadata: HashMap::new() });
            }
            if inner.conflicts > 0 {
                inner.conflicts -= 1;
                return Err(StorageError::PreconditionFailed(key.to_string()));
            }
        }

        let id = (bucket.to_string(), key.to_string());
        let current = inner.objects.get(&id).map(|e| format!("\"v{}\"", e.version));
        let allowed = match &condition {
            WriteCondition::Unconditional => true,
            WriteCondition::IfMatch(tag) => current.as_deref() == Some(tag.as_str()),
            WriteCondition::IfAbsent => current.is_none(),
        };
        if !allowed {
            return Err(StorageError::PreconditionFailed(key.to_string()));
        }

        inner.next_version += 1;
        let version = inner.next_version;
        inner
            .objects
            .insert(id, Entry { body, version, metadata: HashMap::new() });
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
    ) -> StorageResult<ObjectPage> {
        if self.fail_list {
            return Err(StorageError::Backend("AccessDenied: list refused".into()));
        }

        let mut inner = self.inner.lock().unwrap();
        inner.list_calls += 1;

        let mut matching = inner
            .objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .filter(|k| marker.is_none_or(|m| k.as_str() > m));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).collect();
        let is_truncated = matching.next().is_some();
        Ok(ObjectPage { keys, is_truncated })
    }
}
