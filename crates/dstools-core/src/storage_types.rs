use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::StorageOpError;

/// Storage backend types
///
/// `nfs` and `nfs4` selectors resolve to [`StorageType::Local`]; the ACL flavor they
/// imply lives in [`AclFlavor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    Ssh,
    S3,
}

impl FromStr for StorageType {
    type Err = StorageOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "nfs" | "nfs4" => Ok(StorageType::Local),
            "ssh" => Ok(StorageType::Ssh),
            "s3" => Ok(StorageType::S3),
            other => Err(StorageOpError::UnsupportedStorageType(format!(
                "'{}' (expected local, nfs, nfs4, ssh or s3)",
                other
            ))),
        }
    }
}

impl Display for StorageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageType::Local => write!(f, "local"),
            StorageType::Ssh => write!(f, "ssh"),
            StorageType::S3 => write!(f, "s3"),
        }
    }
}

/// What a listing enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Subdirectories,
    Files,
}

impl FromStr for ContentType {
    type Err = StorageOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subdirectories" | "dirs" | "prefixes" => Ok(ContentType::Subdirectories),
            "files" | "objects" => Ok(ContentType::Files),
            other => Err(StorageOpError::Validation(format!(
                "content type must be 'subdirectories' or 'files', got '{}'",
                other
            ))),
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ContentType::Subdirectories => write!(f, "subdirectories"),
            ContentType::Files => write!(f, "files"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessOperation {
    #[default]
    Read,
    Write,
}

impl FromStr for AccessOperation {
    type Err = StorageOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(AccessOperation::Read),
            "write" => Ok(AccessOperation::Write),
            other => Err(StorageOpError::Validation(format!(
                "operation must be 'read' or 'write', got '{}'",
                other
            ))),
        }
    }
}

impl Display for AccessOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AccessOperation::Read => write!(f, "read"),
            AccessOperation::Write => write!(f, "write"),
        }
    }
}

/// ACL mechanism used for filesystem access checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclFlavor {
    /// POSIX ACLs via `getfacl`
    #[default]
    Posix,
    /// NFSv4 ACLs via `nfs4_getfacl`
    Nfs4,
}

impl AclFlavor {
    /// The flavor implied by a storage type selector (`nfs4` → NFSv4, else POSIX).
    pub fn from_selector(selector: &str) -> Self {
        if selector.trim().eq_ignore_ascii_case("nfs4") {
            AclFlavor::Nfs4
        } else {
            AclFlavor::Posix
        }
    }

    pub fn tool(&self) -> &'static str {
        match self {
            AclFlavor::Posix => "getfacl",
            AclFlavor::Nfs4 => "nfs4_getfacl",
        }
    }
}

impl Display for AclFlavor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AclFlavor::Posix => write!(f, "posix"),
            AclFlavor::Nfs4 => write!(f, "nfs4"),
        }
    }
}
