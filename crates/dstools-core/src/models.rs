//! Result models
//!
//! Value objects produced fresh by each operation. Fields are private so a produced
//! result cannot be mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::storage_types::{AccessOperation, ContentType, StorageType};

/// Aggregate metrics for a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetrics {
    location: String,
    storage_type: StorageType,
    item_count: u64,
    total_bytes: u64,
}

impl StorageMetrics {
    pub fn new(
        location: impl Into<String>,
        storage_type: StorageType,
        item_count: u64,
        total_bytes: u64,
    ) -> Self {
        Self {
            location: location.into(),
            storage_type,
            item_count,
            total_bytes,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// Immediate children of a location.
///
/// `truncated` is true only when the enumeration stopped at the cap while the source
/// still had further entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingResult {
    location: String,
    storage_type: StorageType,
    content_type: ContentType,
    items: Vec<String>,
    truncated: bool,
}

impl ListingResult {
    pub fn new(
        location: impl Into<String>,
        storage_type: StorageType,
        content_type: ContentType,
        items: Vec<String>,
        truncated: bool,
    ) -> Self {
        Self {
            location: location.into(),
            storage_type,
            content_type,
            items,
            truncated,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Outcome of an access check. `verification_method` names the concrete mechanism used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResult {
    location: String,
    storage_type: StorageType,
    operation: AccessOperation,
    has_access: bool,
    verification_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AccessResult {
    pub fn new(
        location: impl Into<String>,
        storage_type: StorageType,
        operation: AccessOperation,
        has_access: bool,
        verification_method: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            location: location.into(),
            storage_type,
            operation,
            has_access,
            verification_method: verification_method.into(),
            details,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    pub fn operation(&self) -> AccessOperation {
        self.operation
    }

    pub fn has_access(&self) -> bool {
        self.has_access
    }

    pub fn verification_method(&self) -> &str {
        &self.verification_method
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}
