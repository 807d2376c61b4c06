//! Batch execution
//!
//! Runs several independent requests through one [`UnifiedDispatcher`] with bounded
//! concurrency. One failure never aborts the others; with `fail_fast` set, requests that
//! have not started yet are skipped once a failure has been seen.

use dstools_core::{
    AccessOperation, AccessResult, ContentType, ListingResult, StorageConfig, StorageMetrics,
    StorageOpError, StorageResult,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::dispatcher::UnifiedDispatcher;
use crate::request::resolve_request;

const DEFAULT_MAX_OPERATIONS: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_ITEMS: usize = 1000;

/// The operation-specific part of a batch entry, tagged by `operation`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BatchRequest {
    Analyze,
    List {
        #[serde(default)]
        content_type: ContentType,
        #[serde(default)]
        max_items: Option<usize>,
    },
    VerifyAccess {
        #[serde(default)]
        access: AccessOperation,
    },
}

/// One entry of a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchOperation {
    pub location: String,
    /// Storage type selector (`local`, `nfs`, `nfs4`, `ssh`, `s3`); inferred when absent.
    #[serde(default)]
    pub storage_type: Option<String>,
    /// Defaults per storage type when absent (see [`resolve_request`]).
    #[serde(default)]
    pub config: Option<StorageConfig>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub request: BatchRequest,
}

impl BatchOperation {
    pub fn analyze(location: impl Into<String>, config: StorageConfig) -> Self {
        Self {
            location: location.into(),
            storage_type: None,
            config: Some(config),
            timeout_secs: None,
            request: BatchRequest::Analyze,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_operations: usize,
    pub concurrency: usize,
    pub fail_fast: bool,
    pub default_timeout: Duration,
    pub default_max_items: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_operations: DEFAULT_MAX_OPERATIONS,
            concurrency: DEFAULT_MAX_OPERATIONS,
            fail_fast: false,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// A successful batch entry's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    Metrics(StorageMetrics),
    Listing(ListingResult),
    Access(AccessResult),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Succeeded(OperationOutput),
    Failed(StorageOpError),
    /// Not started because an earlier entry failed under `fail_fast`.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemResult {
    /// Position in the submitted batch.
    pub index: usize,
    pub location: String,
    pub outcome: BatchOutcome,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Ordered by `index`.
    pub results: Vec<BatchItemResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

async fn execute(
    dispatcher: &UnifiedDispatcher,
    operation: &BatchOperation,
    options: &BatchOptions,
) -> StorageResult<OperationOutput> {
    let (location, config) = resolve_request(
        &operation.location,
        operation.storage_type.as_deref(),
        operation.config.clone(),
    )?;
    let timeout = match operation.timeout_secs {
        Some(0) => {
            return Err(StorageOpError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => options.default_timeout,
    };

    match &operation.request {
        BatchRequest::Analyze => dispatcher
            .analyze(&location, &config, timeout)
            .await
            .map(OperationOutput::Metrics),
        BatchRequest::List {
            content_type,
            max_items,
        } => dispatcher
            .list_contents(
                &location,
                &config,
                *content_type,
                max_items.unwrap_or(options.default_max_items),
                timeout,
            )
            .await
            .map(OperationOutput::Listing),
        BatchRequest::VerifyAccess { access } => dispatcher
            .verify_access(&location, &config, *access, timeout)
            .await
            .map(OperationOutput::Access),
    }
}

/// Run `operations` concurrently and report each outcome in submission order.
///
/// Fails as a whole only when the batch itself is malformed (empty or too large).
pub async fn run_batch(
    dispatcher: &UnifiedDispatcher,
    operations: Vec<BatchOperation>,
    options: &BatchOptions,
) -> StorageResult<BatchReport> {
    if operations.is_empty() {
        return Err(StorageOpError::Validation(
            "batch must contain at least one operation".to_string(),
        ));
    }
    if operations.len() > options.max_operations {
        return Err(StorageOpError::Validation(format!(
            "batch contains {} operations; the maximum is {}",
            operations.len(),
            options.max_operations
        )));
    }

    let start = Instant::now();
    let total = operations.len();
    let failure_seen = AtomicBool::new(false);

    let mut results: Vec<BatchItemResult> = stream::iter(operations.into_iter().enumerate())
        .map(|(index, operation)| {
            let failure_seen = &failure_seen;
            async move {
                // Checked on first poll, i.e. when the entry would start.
                if options.fail_fast && failure_seen.load(Ordering::SeqCst) {
                    return BatchItemResult {
                        index,
                        location: operation.location,
                        outcome: BatchOutcome::Skipped,
                        duration_ms: 0.0,
                    };
                }

                let op_start = Instant::now();
                let outcome = match execute(dispatcher, &operation, options).await {
                    Ok(output) => BatchOutcome::Succeeded(output),
                    Err(e) => {
                        failure_seen.store(true, Ordering::SeqCst);
                        BatchOutcome::Failed(e)
                    }
                };
                BatchItemResult {
                    index,
                    location: operation.location,
                    outcome,
                    duration_ms: op_start.elapsed().as_secs_f64() * 1000.0,
                }
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|result| result.index);

    let count = |f: fn(&BatchOutcome) -> bool| results.iter().filter(|r| f(&r.outcome)).count();
    let succeeded = count(|o| matches!(o, BatchOutcome::Succeeded(_)));
    let failed = count(|o| matches!(o, BatchOutcome::Failed(_)));
    let skipped = count(|o| matches!(o, BatchOutcome::Skipped));

    tracing::info!(
        operations = total,
        succeeded = succeeded,
        failed = failed,
        skipped = skipped,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Batch completed"
    );

    Ok(BatchReport {
        results,
        succeeded,
        failed,
        skipped,
    })
}
