use dstools_core::{Settings, StorageOpError, StorageResult};
use dstools_storage::{BatchOptions, UnifiedDispatcher};
use std::time::Duration;

/// Shared application state handed to every handler.
pub struct AppState {
    pub dispatcher: UnifiedDispatcher,
    pub settings: Settings,
}

impl AppState {
    pub fn new(dispatcher: UnifiedDispatcher, settings: Settings) -> Self {
        Self {
            dispatcher,
            settings,
        }
    }

    /// Per-request timeout, falling back to `DSTOOLS_DEFAULT_TIMEOUT_SECS`.
    pub fn timeout_for(&self, timeout_secs: Option<u64>) -> StorageResult<Duration> {
        match timeout_secs {
            Some(0) => Err(StorageOpError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            )),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(self.settings.default_timeout()),
        }
    }

    pub fn batch_options(&self, fail_fast: bool) -> BatchOptions {
        BatchOptions {
            max_operations: self.settings.batch_max_operations,
            concurrency: self.settings.batch_max_operations,
            fail_fast,
            default_timeout: self.settings.default_timeout(),
            default_max_items: self.settings.max_items,
        }
    }
}
