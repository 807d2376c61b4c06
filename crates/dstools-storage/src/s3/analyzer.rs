use async_trait::async_trait;
use dstools_core::{
    AccessOperation, AccessResult, ContentType, ListingResult, LocationTarget, StorageConfig,
    StorageLocation, StorageMetrics, StorageOpError, StorageResult, StorageType,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{
    ListObjectsPage, ListObjectsRequest, ObjectStoreClient, ObjectStoreClientError,
    ObjectStoreClientFactory,
};
use crate::traits::StorageAnalyzer;

/// Key prefix of the throwaway multipart uploads used by write probes.
pub const PROBE_OBJECT_PREFIX: &str = ".dstools-access-probe-";

const DELIMITER: &str = "/";
const READ_PROBE_METHOD: &str = "s3:ListObjectsV2(max-keys=1)";
const WRITE_PROBE_METHOD: &str = "s3:CreateMultipartUpload+AbortMultipartUpload";

/// S3 analyzer
///
/// Holds only a client factory; every call builds a client from its own configuration.
pub struct S3Analyzer {
    factory: Arc<dyn ObjectStoreClientFactory>,
    page_size: Option<i32>,
}

impl S3Analyzer {
    pub fn new(factory: Arc<dyn ObjectStoreClientFactory>) -> Self {
        Self {
            factory,
            page_size: None,
        }
    }

    /// Request at most `page_size` keys per `ListObjectsV2` call.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    async fn client(&self, config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStoreClient>> {
        match config {
            StorageConfig::S3(s3) => self.factory.client_for(s3).await,
            _ => Err(StorageOpError::InvalidCredentials(
                "S3 locations require an S3 configuration".to_string(),
            )),
        }
    }

    fn request(&self, bucket: &str, prefix: &str, delimiter: bool) -> ListObjectsRequest {
        ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            delimiter: delimiter.then(|| DELIMITER.to_string()),
            max_keys: self.page_size,
            continuation_token: None,
        }
    }
}

/// Bucket plus the prefix treated as a directory (`data` becomes `data/`).
fn bucket_and_prefix(location: &StorageLocation) -> StorageResult<(&str, String)> {
    match location.target() {
        LocationTarget::S3 { bucket, prefix } => {
            let prefix = if prefix.is_empty() || prefix.ends_with(DELIMITER) {
                prefix.clone()
            } else {
                format!("{}{}", prefix, DELIMITER)
            };
            Ok((bucket.as_str(), prefix))
        }
        _ => Err(StorageOpError::Validation(format!(
            "location '{}' is not an S3 location",
            location
        ))),
    }
}

fn child_names(page: &ListObjectsPage, prefix: &str, content_type: ContentType) -> Vec<String> {
    match content_type {
        ContentType::Subdirectories => page
            .common_prefixes
            .iter()
            .filter_map(|common| common.strip_prefix(prefix))
            .map(|name| name.trim_end_matches(DELIMITER).to_string())
            .filter(|name| !name.is_empty())
            .collect(),
        ContentType::Files => page
            .objects
            .iter()
            .filter(|object| !object.is_directory_marker())
            .filter_map(|object| object.key.strip_prefix(prefix))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Aborts an initiated multipart upload if the probe is dropped before it could.
struct AbortOnDrop {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
    key: String,
    upload_id: String,
    armed: bool,
}

impl AbortOnDrop {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                bucket = %self.bucket,
                key = %self.key,
                upload_id = %self.upload_id,
                "No runtime to abort probe upload; it will linger until lifecycle cleanup"
            );
            return;
        };
        let client = Arc::clone(&self.client);
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        let upload_id = std::mem::take(&mut self.upload_id);
        handle.spawn(async move {
            match client.abort_multipart_upload(&bucket, &key, &upload_id).await {
                Ok(()) => tracing::debug!(bucket = %bucket, key = %key, "Aborted cancelled probe upload"),
                Err(e) => tracing::warn!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %e,
                    "Failed to abort cancelled probe upload"
                ),
            }
        });
    }
}

#[async_trait]
impl StorageAnalyzer for S3Analyzer {
    fn storage_type(&self) -> StorageType {
        StorageType::S3
    }

    async fn analyze(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        _timeout: Duration,
    ) -> StorageResult<StorageMetrics> {
        let (bucket, prefix) = bucket_and_prefix(location)?;
        let client = self.client(config).await?;

        let mut request = self.request(bucket, &prefix, false);
        let mut count: u64 = 0;
        let mut bytes: u64 = 0;
        let mut pages: u32 = 0;

        loop {
            let page = client.list_objects(&request).await?;
            pages += 1;
            for object in page.objects.iter().filter(|o| !o.is_directory_marker()) {
                count += 1;
                bytes = bytes.saturating_add(object.size);
            }
            match page.next_continuation_token {
                Some(token) => request.continuation_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(
            bucket = %bucket,
            prefix = %prefix,
            pages = pages,
            item_count = count,
            "Summed S3 prefix"
        );

        Ok(StorageMetrics::new(location.raw(), StorageType::S3, count, bytes))
    }

    async fn list_contents(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        content_type: ContentType,
        max_items: usize,
        _timeout: Duration,
    ) -> StorageResult<ListingResult> {
        let (bucket, prefix) = bucket_and_prefix(location)?;
        let client = self.client(config).await?;

        let mut request = self.request(bucket, &prefix, true);
        let mut items: Vec<String> = Vec::new();
        let mut truncated = false;

        'pages: loop {
            let page = client.list_objects(&request).await?;
            for name in child_names(&page, &prefix, content_type) {
                if items.len() == max_items {
                    truncated = true;
                    break 'pages;
                }
                items.push(name);
            }
            match page.next_continuation_token {
                Some(token) => request.continuation_token = Some(token),
                None => break,
            }
        }

        Ok(ListingResult::new(
            location.raw(),
            StorageType::S3,
            content_type,
            items,
            truncated,
        ))
    }

    async fn verify_access(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        operation: AccessOperation,
        _timeout: Duration,
    ) -> StorageResult<AccessResult> {
        let (bucket, prefix) = bucket_and_prefix(location)?;
        let client = self.client(config).await?;

        let result = |has_access: bool, method: &str, details: Option<String>| {
            AccessResult::new(
                location.raw(),
                StorageType::S3,
                operation,
                has_access,
                method,
                details,
            )
        };

        match operation {
            AccessOperation::Read => {
                let request = ListObjectsRequest {
                    max_keys: Some(1),
                    ..self.request(bucket, &prefix, false)
                };
                match client.list_objects(&request).await {
                    Ok(_) => Ok(result(true, READ_PROBE_METHOD, None)),
                    Err(ObjectStoreClientError::AccessDenied(msg)) => {
                        Ok(result(false, READ_PROBE_METHOD, Some(msg)))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            AccessOperation::Write => {
                let key = format!("{}{}{}", prefix, PROBE_OBJECT_PREFIX, Uuid::new_v4());
                let upload_id = match client.create_multipart_upload(bucket, &key).await {
                    Ok(upload_id) => upload_id,
                    Err(e @ ObjectStoreClientError::Connection(_))
                    | Err(e @ ObjectStoreClientError::Unauthenticated(_)) => return Err(e.into()),
                    Err(e) => {
                        return Ok(result(
                            false,
                            WRITE_PROBE_METHOD,
                            Some(format!("CreateMultipartUpload failed: {}", e)),
                        ))
                    }
                };

                let mut guard = AbortOnDrop {
                    client: Arc::clone(&client),
                    bucket: bucket.to_string(),
                    key: key.clone(),
                    upload_id: upload_id.clone(),
                    armed: true,
                };
                let aborted = client.abort_multipart_upload(bucket, &key, &upload_id).await;
                guard.disarm();

                match aborted {
                    Ok(()) => Ok(result(true, WRITE_PROBE_METHOD, None)),
                    Err(e) => {
                        tracing::warn!(
                            bucket = %bucket,
                            key = %key,
                            upload_id = %upload_id,
                            error = %e,
                            "Probe upload could not be aborted"
                        );
                        Ok(result(
                            false,
                            WRITE_PROBE_METHOD,
                            Some(format!(
                                "AbortMultipartUpload failed for upload {} on key {}: {}",
                                upload_id, key, e
                            )),
                        ))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::mock::{MockClientFactory, MockObjectStore, MockOperation};
    use dstools_core::{ErrorKind, S3Config};

    fn s3_config() -> StorageConfig {
        StorageConfig::S3(S3Config::default())
    }

    fn analyzer(store: Arc<MockObjectStore>) -> S3Analyzer {
        S3Analyzer::new(Arc::new(MockClientFactory::new(store)))
    }

    fn location(raw: &str) -> StorageLocation {
        StorageLocation::parse(raw).unwrap()
    }

    fn store() -> Arc<MockObjectStore> {
        Arc::new(
            MockObjectStore::new()
                .with_bucket("data-lake")
                .with_object("data-lake", "raw/", 0)
                .with_object("data-lake", "raw/a.csv", 100)
                .with_object("data-lake", "raw/b.csv", 250)
                .with_object("data-lake", "raw/2024/", 0)
                .with_object("data-lake", "raw/2024/jan.csv", 40)
                .with_object("data-lake", "raw/2025/feb.csv", 60)
                .with_object("data-lake", "rawish/other.csv", 999),
        )
    }

    #[tokio::test]
    async fn analyze_sums_across_pages_and_skips_markers() {
        let store = Arc::new(
            MockObjectStore::new()
                .with_bucket("data-lake")
                .with_page_size(2)
                .with_objects("data-lake", (0..5).map(|i| (format!("logs/{}.gz", i), 10))),
        );
        let metrics = analyzer(store.clone())
            .analyze(&location("s3://data-lake/logs"), &s3_config(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(metrics.item_count(), 5);
        assert_eq!(metrics.total_bytes(), 50);
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn analyze_treats_prefix_as_directory() {
        let metrics = analyzer(store())
            .analyze(&location("s3://data-lake/raw"), &s3_config(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(metrics.item_count(), 4);
        assert_eq!(metrics.total_bytes(), 450);
    }

    #[tokio::test]
    async fn subdirectories_are_relative_prefix_names() {
        let listing = analyzer(store())
            .list_contents(
                &location("s3://data-lake/raw/"),
                &s3_config(),
                ContentType::Subdirectories,
                10,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(listing.items(), ["2024".to_string(), "2025".to_string()]);
        assert!(!listing.truncated());
    }

    #[tokio::test]
    async fn files_listing_is_immediate_and_marker_free() {
        let listing = analyzer(store())
            .list_contents(
                &location("s3://data-lake/raw"),
                &s3_config(),
                ContentType::Files,
                10,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(listing.items(), ["a.csv".to_string(), "b.csv".to_string()]);
    }

    #[tokio::test]
    async fn listing_truncates_only_when_more_exist() {
        let store = Arc::new(
            MockObjectStore::new()
                .with_bucket("b-1")
                .with_page_size(2)
                .with_objects("b-1", (0..4).map(|i| (format!("dir{}/x", i), 1))),
        );
        let analyzer = analyzer(store);

        let capped = analyzer
            .list_contents(
                &location("s3://b-1"),
                &s3_config(),
                ContentType::Subdirectories,
                3,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(capped.items().len(), 3);
        assert!(capped.truncated());

        let exact = analyzer
            .list_contents(
                &location("s3://b-1"),
                &s3_config(),
                ContentType::Subdirectories,
                4,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(exact.items().len(), 4);
        assert!(!exact.truncated());
    }

    #[tokio::test]
    async fn read_probe_lists_one_key() {
        let store = store();
        let result = analyzer(store.clone())
            .verify_access(
                &location("s3://data-lake/raw"),
                &s3_config(),
                AccessOperation::Read,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(result.has_access());
        assert_eq!(result.verification_method(), READ_PROBE_METHOD);
        assert_eq!(store.last_list_request().unwrap().max_keys, Some(1));
    }

    #[tokio::test]
    async fn repeated_read_checks_agree() {
        let analyzer = analyzer(store());
        let mut results = Vec::new();
        for _ in 0..2 {
            results.push(
                analyzer
                    .verify_access(
                        &location("s3://data-lake/raw"),
                        &s3_config(),
                        AccessOperation::Read,
                        Duration::from_secs(5),
                    )
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(results[0].has_access(), results[1].has_access());
        assert_eq!(
            results[0].verification_method(),
            results[1].verification_method()
        );
    }

    fn flat_store() -> Arc<MockObjectStore> {
        Arc::new(
            MockObjectStore::new()
                .with_bucket("flat")
                .with_page_size(2)
                .with_object("flat", "drop/", 0)
                .with_objects("flat", (0..5).map(|i| (format!("drop/f{}.dat", i), 3))),
        )
    }

    #[tokio::test]
    async fn flat_prefix_count_matches_files_listing() {
        let analyzer = analyzer(flat_store());
        let metrics = analyzer
            .analyze(&location("s3://flat/drop"), &s3_config(), Duration::from_secs(5))
            .await
            .unwrap();
        let listing = analyzer
            .list_contents(
                &location("s3://flat/drop"),
                &s3_config(),
                ContentType::Files,
                100,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(metrics.item_count(), 5);
        assert_eq!(metrics.item_count(), listing.items().len() as u64);
        assert!(!listing.truncated());
    }

    #[tokio::test]
    async fn five_files_capped_at_two() {
        let listing = analyzer(flat_store())
            .list_contents(
                &location("s3://flat/drop"),
                &s3_config(),
                ContentType::Files,
                2,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(listing.items().len(), 2);
        assert!(listing.truncated());
    }

    #[tokio::test]
    async fn read_probe_denied_is_no_access() {
        let store = store();
        store.fail(
            MockOperation::List,
            ObjectStoreClientError::AccessDenied("AccessDenied".to_string()),
        );
        let result = analyzer(store)
            .verify_access(
                &location("s3://data-lake/raw"),
                &s3_config(),
                AccessOperation::Read,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!result.has_access());
    }

    #[tokio::test]
    async fn write_probe_leaves_nothing_behind() {
        let store = store();
        let result = analyzer(store.clone())
            .verify_access(
                &location("s3://data-lake/raw"),
                &s3_config(),
                AccessOperation::Write,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(result.has_access());
        assert_eq!(result.verification_method(), WRITE_PROBE_METHOD);
        assert_eq!(store.uploads_started(), 1);
        assert_eq!(store.open_uploads(), 0);
        assert_eq!(store.object_count("data-lake"), 7);
    }

    #[tokio::test]
    async fn write_probe_abort_failure_is_reported() {
        let store = store();
        store.fail(
            MockOperation::AbortMultipartUpload,
            ObjectStoreClientError::Service("InternalError".to_string()),
        );
        let result = analyzer(store)
            .verify_access(
                &location("s3://data-lake/raw"),
                &s3_config(),
                AccessOperation::Write,
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(!result.has_access());
        assert!(result.details().unwrap().contains("AbortMultipartUpload failed"));
    }

    #[tokio::test]
    async fn cancelled_write_probe_still_aborts() {
        let store = store();
        store.delay_next_abort(Duration::from_millis(500));
        let analyzer = analyzer(store.clone());
        let location = location("s3://data-lake/raw");
        let config = s3_config();

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            analyzer.verify_access(&location, &config, AccessOperation::Write, Duration::from_secs(5)),
        )
        .await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.uploads_started(), 1);
        assert_eq!(store.open_uploads(), 0);
    }

    #[tokio::test]
    async fn missing_bucket_is_an_error_not_a_denial() {
        let err = analyzer(store())
            .analyze(&location("s3://no-such-bucket"), &s3_config(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandExecution);
    }
}
