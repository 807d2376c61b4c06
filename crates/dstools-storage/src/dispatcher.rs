//! Unified dispatcher
//!
//! Resolves a location to its backend, validates the configuration once, and runs the
//! requested operation under a hard timeout. No retries happen at this level.

use dstools_core::{
    AccessOperation, AccessResult, ContentType, ErrorMetadata, ListingResult, LogLevel,
    StorageConfig, StorageLocation, StorageMetrics, StorageOpError, StorageResult, StorageType,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::filesystem::{LocalFilesystemAnalyzer, SshFilesystemAnalyzer};
use crate::traits::StorageAnalyzer;

#[derive(Clone)]
pub struct UnifiedDispatcher {
    analyzers: HashMap<StorageType, Arc<dyn StorageAnalyzer>>,
}

impl Default for UnifiedDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UnifiedDispatcher {
    /// Dispatcher with every backend compiled into this build.
    pub fn new() -> Self {
        let dispatcher = Self::empty()
            .with_analyzer(Arc::new(LocalFilesystemAnalyzer::new()))
            .with_analyzer(Arc::new(SshFilesystemAnalyzer::new()));

        #[cfg(feature = "storage-s3")]
        let dispatcher = dispatcher.with_analyzer(Arc::new(crate::s3::S3Analyzer::new(
            Arc::new(crate::s3::AwsClientFactory),
        )));

        dispatcher
    }

    /// Dispatcher with no backends registered.
    pub fn empty() -> Self {
        Self {
            analyzers: HashMap::new(),
        }
    }

    /// Register (or replace) the analyzer for its storage type.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn StorageAnalyzer>) -> Self {
        self.analyzers.insert(analyzer.storage_type(), analyzer);
        self
    }

    pub fn supported_types(&self) -> Vec<StorageType> {
        let mut types: Vec<StorageType> = self.analyzers.keys().copied().collect();
        types.sort_by_key(|t| t.to_string());
        types
    }

    /// Select and validate, naming the operation and location in any error.
    fn prepare(
        &self,
        operation: &'static str,
        location: &StorageLocation,
        config: &StorageConfig,
    ) -> StorageResult<Arc<dyn StorageAnalyzer>> {
        self.select(location, config)
            .map_err(|e| e.with_context(operation_context(operation, location)))
    }

    fn select(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
    ) -> StorageResult<Arc<dyn StorageAnalyzer>> {
        let storage_type = location.storage_type();
        let analyzer = self.analyzers.get(&storage_type).cloned().ok_or_else(|| {
            StorageOpError::UnsupportedStorageType(format!(
                "no backend available for {} locations in this build",
                storage_type
            ))
        })?;

        if config.storage_type() != storage_type {
            return Err(StorageOpError::InvalidCredentials(format!(
                "{} configuration supplied for a {} location",
                config.storage_type(),
                storage_type
            )));
        }
        config.validate()?;
        Ok(analyzer)
    }

    async fn run<T, Fut>(
        &self,
        operation: &'static str,
        location: &StorageLocation,
        timeout: Duration,
        call: Fut,
    ) -> StorageResult<T>
    where
        Fut: Future<Output = StorageResult<T>>,
    {
        let start = Instant::now();
        let storage_type = location.storage_type();

        tracing::debug!(
            operation = operation,
            location = %location,
            storage_type = %storage_type,
            timeout_secs = timeout.as_secs_f64(),
            "Dispatching storage operation"
        );

        let result = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StorageOpError::Timeout(format!(
                "no result within {:.1}s",
                timeout.as_secs_f64()
            ))),
        };
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(value) => {
                tracing::info!(
                    operation = operation,
                    location = %location,
                    storage_type = %storage_type,
                    duration_ms = duration_ms,
                    "Storage operation completed"
                );
                Ok(value)
            }
            Err(e) => {
                let e = e.with_context(operation_context(operation, location));
                match e.log_level() {
                    LogLevel::Error => tracing::error!(
                        error = %e,
                        error_code = e.error_code(),
                        duration_ms = duration_ms,
                        "Storage operation failed"
                    ),
                    LogLevel::Warn => tracing::warn!(
                        error = %e,
                        error_code = e.error_code(),
                        duration_ms = duration_ms,
                        "Storage operation failed"
                    ),
                    LogLevel::Debug => tracing::debug!(
                        error = %e,
                        error_code = e.error_code(),
                        duration_ms = duration_ms,
                        "Storage operation failed"
                    ),
                }
                Err(e)
            }
        }
    }

    pub async fn analyze(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        timeout: Duration,
    ) -> StorageResult<StorageMetrics> {
        let analyzer = self.prepare("analyze", location, config)?;
        self.run(
            "analyze",
            location,
            timeout,
            analyzer.analyze(location, config, timeout),
        )
        .await
    }

    pub async fn list_contents(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        content_type: ContentType,
        max_items: usize,
        timeout: Duration,
    ) -> StorageResult<ListingResult> {
        if max_items == 0 {
            return Err(StorageOpError::Validation(
                "max_items must be greater than zero".to_string(),
            ));
        }
        let analyzer = self.prepare("list_contents", location, config)?;
        self.run(
            "list_contents",
            location,
            timeout,
            analyzer.list_contents(location, config, content_type, max_items, timeout),
        )
        .await
    }

    pub async fn verify_access(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        operation: AccessOperation,
        timeout: Duration,
    ) -> StorageResult<AccessResult> {
        let analyzer = self.prepare("verify_access", location, config)?;
        self.run(
            "verify_access",
            location,
            timeout,
            analyzer.verify_access(location, config, operation, timeout),
        )
        .await
    }
}

fn operation_context(operation: &str, location: &StorageLocation) -> String {
    format!("{} {} ({})", operation, location, location.storage_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::mock::{MockClientFactory, MockObjectStore};
    use crate::s3::S3Analyzer;
    use async_trait::async_trait;
    use dstools_core::{ErrorKind, S3Config, SshConfig};
    use tempfile::tempdir;

    /// Never finishes.
    struct StuckAnalyzer;

    #[async_trait]
    impl StorageAnalyzer for StuckAnalyzer {
        fn storage_type(&self) -> StorageType {
            StorageType::Local
        }

        async fn analyze(
            &self,
            _location: &StorageLocation,
            _config: &StorageConfig,
            _timeout: Duration,
        ) -> StorageResult<StorageMetrics> {
            std::future::pending().await
        }

        async fn list_contents(
            &self,
            _location: &StorageLocation,
            _config: &StorageConfig,
            _content_type: ContentType,
            _max_items: usize,
            _timeout: Duration,
        ) -> StorageResult<ListingResult> {
            std::future::pending().await
        }

        async fn verify_access(
            &self,
            _location: &StorageLocation,
            _config: &StorageConfig,
            _operation: AccessOperation,
            _timeout: Duration,
        ) -> StorageResult<AccessResult> {
            std::future::pending().await
        }
    }

    fn mock_dispatcher(store: Arc<MockObjectStore>) -> UnifiedDispatcher {
        UnifiedDispatcher::new().with_analyzer(Arc::new(S3Analyzer::new(Arc::new(
            MockClientFactory::new(store),
        ))))
    }

    #[tokio::test]
    async fn hung_backend_times_out() {
        let dispatcher = UnifiedDispatcher::empty().with_analyzer(Arc::new(StuckAnalyzer));
        let location = StorageLocation::parse("/data").unwrap();
        let err = dispatcher
            .analyze(&location, &StorageConfig::local(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("analyze /data"));
    }

    #[tokio::test]
    async fn mismatched_configuration_is_rejected_before_io() {
        let store = Arc::new(MockObjectStore::new().with_bucket("bucket"));
        let dispatcher = mock_dispatcher(store.clone());
        let location = StorageLocation::parse("s3://bucket/x").unwrap();
        let err = dispatcher
            .analyze(
                &location,
                &StorageConfig::Ssh(SshConfig::new("h", "u", "/k")),
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert!(err.to_string().contains("analyze s3://bucket/x (s3)"));
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn partial_s3_credentials_never_reach_the_backend() {
        let store = Arc::new(MockObjectStore::new().with_bucket("bucket"));
        let dispatcher = mock_dispatcher(store.clone());
        let location = StorageLocation::parse("s3://bucket").unwrap();
        let config = StorageConfig::S3(S3Config {
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        });
        let err = dispatcher
            .verify_access(&location, &config, AccessOperation::Read, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn unregistered_backend_is_unsupported() {
        let dispatcher = UnifiedDispatcher::empty();
        let location = StorageLocation::parse("s3://bucket").unwrap();
        let err = dispatcher
            .analyze(
                &location,
                &StorageConfig::S3(S3Config::default()),
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedStorageType);
        assert!(err.detail().starts_with("analyze s3://bucket (s3): "));
    }

    #[tokio::test]
    async fn zero_max_items_is_a_validation_error() {
        let dir = tempdir().unwrap();
        let location = StorageLocation::parse(dir.path().to_str().unwrap()).unwrap();
        let err = UnifiedDispatcher::new()
            .list_contents(
                &location,
                &StorageConfig::local(),
                ContentType::Files,
                0,
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn routes_to_the_matching_backend() {
        let store = Arc::new(
            MockObjectStore::new()
                .with_bucket("bucket")
                .with_object("bucket", "k/a", 3),
        );
        let dispatcher = mock_dispatcher(store);
        let metrics = dispatcher
            .analyze(
                &StorageLocation::parse("s3://bucket/k").unwrap(),
                &StorageConfig::S3(S3Config::default()),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(metrics.storage_type(), StorageType::S3);
        assert_eq!(metrics.total_bytes(), 3);

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f"), b"1234").unwrap();
        let local = dispatcher
            .analyze(
                &StorageLocation::parse(dir.path().to_str().unwrap()).unwrap(),
                &StorageConfig::local(),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(local.storage_type(), StorageType::Local);
        assert_eq!(local.total_bytes(), 4);
    }
}
