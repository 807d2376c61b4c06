//! In-memory object store for tests
//!
//! Emulates `ListObjectsV2` paging and delimiter grouping closely enough for the
//! analyzer: keys are returned in lexicographic order, each common prefix counts as one
//! entry toward the page size, and the continuation token is the last entry returned.

use async_trait::async_trait;
use dstools_core::{S3Config, StorageResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use super::{
    ListObjectsPage, ListObjectsRequest, ObjectStoreClient, ObjectStoreClientError,
    ObjectStoreClientFactory, ObjectSummary,
};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    List,
    CreateMultipartUpload,
    AbortMultipartUpload,
}

enum Entry {
    Object(ObjectSummary),
    Prefix(String),
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Object(object) => &object.key,
            Entry::Prefix(prefix) => prefix,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MockObjectStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, u64>>>,
    uploads: Mutex<HashMap<String, (String, String)>>,
    failures: Mutex<HashMap<MockOperation, ObjectStoreClientError>>,
    abort_delay: Mutex<Option<Duration>>,
    last_list: Mutex<Option<ListObjectsRequest>>,
    page_size: Option<usize>,
    list_calls: AtomicUsize,
    uploads_started: AtomicUsize,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        lock(&self.buckets).entry(bucket.to_string()).or_default();
        self
    }

    pub fn with_object(self, bucket: &str, key: &str, size: u64) -> Self {
        lock(&self.buckets)
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), size);
        self
    }

    pub fn with_objects(self, bucket: &str, objects: impl IntoIterator<Item = (String, u64)>) -> Self {
        {
            let mut buckets = lock(&self.buckets);
            let entries = buckets.entry(bucket.to_string()).or_default();
            entries.extend(objects);
        }
        self
    }

    /// Cap every page at `page_size` entries regardless of `max_keys`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Make every later call of `operation` fail with `error`.
    pub fn fail(&self, operation: MockOperation, error: ObjectStoreClientError) {
        lock(&self.failures).insert(operation, error);
    }

    /// Stall the next abort call before it takes effect.
    pub fn delay_next_abort(&self, delay: Duration) {
        *lock(&self.abort_delay) = Some(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn last_list_request(&self) -> Option<ListObjectsRequest> {
        lock(&self.last_list).clone()
    }

    pub fn uploads_started(&self) -> usize {
        self.uploads_started.load(Ordering::SeqCst)
    }

    /// Multipart uploads initiated and not yet aborted.
    pub fn open_uploads(&self) -> usize {
        lock(&self.uploads).len()
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        lock(&self.buckets).get(bucket).map_or(0, BTreeMap::len)
    }

    fn injected(&self, operation: MockOperation) -> Result<(), ObjectStoreClientError> {
        match lock(&self.failures).get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn entries(
        keys: &BTreeMap<String, u64>,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Vec<Entry> {
        let mut entries = Vec::new();
        let mut seen = BTreeSet::new();
        for (key, size) in keys.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            if let Some(delimiter) = delimiter {
                if let Some(idx) = rest.find(delimiter) {
                    let common = format!("{}{}", prefix, &rest[..idx + delimiter.len()]);
                    if seen.insert(common.clone()) {
                        entries.push(Entry::Prefix(common));
                    }
                    continue;
                }
            }
            entries.push(Entry::Object(ObjectSummary {
                key: key.clone(),
                size: *size,
            }));
        }
        entries
    }
}

#[async_trait]
impl ObjectStoreClient for MockObjectStore {
    async fn list_objects(
        &self,
        request: &ListObjectsRequest,
    ) -> Result<ListObjectsPage, ObjectStoreClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_list) = Some(request.clone());
        self.injected(MockOperation::List)?;

        let buckets = lock(&self.buckets);
        let keys = buckets.get(&request.bucket).ok_or_else(|| {
            ObjectStoreClientError::NotFound(format!("NoSuchBucket: {}", request.bucket))
        })?;

        let requested = request
            .max_keys
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let limit = self.page_size.map_or(requested, |size| size.min(requested));

        let remaining: Vec<Entry> =
            Self::entries(keys, &request.prefix, request.delimiter.as_deref())
                .into_iter()
                .filter(|entry| match &request.continuation_token {
                    Some(token) => entry.name() > token.as_str(),
                    None => true,
                })
                .collect();

        let more = remaining.len() > limit;
        let mut page = ListObjectsPage::default();
        for entry in remaining.into_iter().take(limit) {
            if more {
                page.next_continuation_token = Some(entry.name().to_string());
            }
            match entry {
                Entry::Object(object) => page.objects.push(object),
                Entry::Prefix(prefix) => page.common_prefixes.push(prefix),
            }
        }
        Ok(page)
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, ObjectStoreClientError> {
        self.injected(MockOperation::CreateMultipartUpload)?;
        if !lock(&self.buckets).contains_key(bucket) {
            return Err(ObjectStoreClientError::NotFound(format!(
                "NoSuchBucket: {}",
                bucket
            )));
        }
        let upload_id = Uuid::new_v4().to_string();
        lock(&self.uploads).insert(upload_id.clone(), (bucket.to_string(), key.to_string()));
        self.uploads_started.fetch_add(1, Ordering::SeqCst);
        Ok(upload_id)
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), ObjectStoreClientError> {
        let delay = lock(&self.abort_delay).take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.injected(MockOperation::AbortMultipartUpload)?;

        let mut uploads = lock(&self.uploads);
        let known = uploads
            .get(upload_id)
            .is_some_and(|(b, k)| b == bucket && k == key);
        if !known {
            return Err(ObjectStoreClientError::NotFound(format!(
                "NoSuchUpload: {}",
                upload_id
            )));
        }
        uploads.remove(upload_id);
        Ok(())
    }
}

/// Hands out the same store for every configuration and counts the clients built.
pub struct MockClientFactory {
    store: Arc<MockObjectStore>,
    built: AtomicUsize,
}

impl MockClientFactory {
    pub fn new(store: Arc<MockObjectStore>) -> Self {
        Self {
            store,
            built: AtomicUsize::new(0),
        }
    }

    pub fn clients_built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStoreClientFactory for MockClientFactory {
    async fn client_for(&self, _config: &S3Config) -> StorageResult<Arc<dyn ObjectStoreClient>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}
