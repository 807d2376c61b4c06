//! Storage location parsing
//!
//! A caller-supplied path string resolves to exactly one backend:
//!
//! - `s3://bucket/prefix` → S3 (`bucket`, `prefix`)
//! - `ssh://[user@]host[:port]/path` or scp-style `[user@]host:/path` → SSH
//! - `file:///path` or anything else → local filesystem
//!
//! An explicit [`StorageType`] from the caller wins over inference.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use crate::error::{StorageOpError, StorageResult};
use crate::storage_types::StorageType;

const S3_SCHEME: &str = "s3://";
const SSH_SCHEME: &str = "ssh://";
const FILE_SCHEME: &str = "file://";

/// Backend-specific decomposition of a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationTarget {
    Local {
        path: PathBuf,
    },
    /// Host and user are optional here; [`crate::SshConfig`] supplies whatever the location omits.
    Ssh {
        hostname: Option<String>,
        username: Option<String>,
        port: Option<u16>,
        path: String,
    },
    S3 {
        bucket: String,
        prefix: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    raw: String,
    target: LocationTarget,
}

impl StorageLocation {
    /// Parse a location, inferring the storage type from its format.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        Self::resolve(raw, None)
    }

    /// Parse a location with an optional explicit storage type.
    pub fn resolve(raw: &str, explicit: Option<StorageType>) -> StorageResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StorageOpError::Validation("location must not be empty".to_string()));
        }

        let storage_type = match explicit {
            Some(storage_type) => storage_type,
            None => Self::infer_type(trimmed)?,
        };

        let target = match storage_type {
            StorageType::Local => parse_local(trimmed),
            StorageType::Ssh => parse_ssh(trimmed)?,
            StorageType::S3 => parse_s3(trimmed)?,
        };

        Ok(StorageLocation {
            raw: trimmed.to_string(),
            target,
        })
    }

    /// Infer the storage type from the location format alone.
    pub fn infer_type(raw: &str) -> StorageResult<StorageType> {
        if raw.starts_with(S3_SCHEME) {
            return Ok(StorageType::S3);
        }
        if raw.starts_with(SSH_SCHEME) {
            return Ok(StorageType::Ssh);
        }
        if raw.starts_with(FILE_SCHEME) {
            return Ok(StorageType::Local);
        }
        if let Some((scheme, _)) = raw.split_once("://") {
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(StorageOpError::UnsupportedStorageType(format!(
                    "unknown scheme '{}://' in location '{}'",
                    scheme, raw
                )));
            }
        }
        if split_scp(raw).is_some() {
            return Ok(StorageType::Ssh);
        }
        Ok(StorageType::Local)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn target(&self) -> &LocationTarget {
        &self.target
    }

    pub fn storage_type(&self) -> StorageType {
        match self.target {
            LocationTarget::Local { .. } => StorageType::Local,
            LocationTarget::Ssh { .. } => StorageType::Ssh,
            LocationTarget::S3 { .. } => StorageType::S3,
        }
    }
}

impl Display for StorageLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.raw)
    }
}

fn parse_local(raw: &str) -> LocationTarget {
    let path = raw.strip_prefix(FILE_SCHEME).unwrap_or(raw);
    LocationTarget::Local {
        path: PathBuf::from(path),
    }
}

/// Split scp-style `[user@]host:path`. A single drive letter (`C:\data`) is not a host.
fn split_scp(raw: &str) -> Option<(&str, &str)> {
    let (head, path) = raw.split_once(':')?;
    if head.is_empty() || path.is_empty() || head.contains('/') || head.contains('\\') {
        return None;
    }
    if head.len() == 1 && head.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((head, path))
}

fn split_user_host(user_host: &str) -> (Option<String>, &str) {
    match user_host.split_once('@') {
        Some((user, host)) if !user.is_empty() => (Some(user.to_string()), host),
        Some((_, host)) => (None, host),
        None => (None, user_host),
    }
}

fn parse_ssh(raw: &str) -> StorageResult<LocationTarget> {
    if let Some(rest) = raw.strip_prefix(SSH_SCHEME) {
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if path.is_empty() {
            return Err(StorageOpError::Validation(format!(
                "SSH location '{}' is missing a remote path",
                raw
            )));
        }
        let (username, host_port) = split_user_host(authority);
        let (hostname, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    StorageOpError::Validation(format!(
                        "invalid port '{}' in SSH location '{}'",
                        port, raw
                    ))
                })?;
                (host, Some(port))
            }
            None => (host_port, None),
        };
        if hostname.is_empty() {
            return Err(StorageOpError::Validation(format!(
                "SSH location '{}' is missing a hostname",
                raw
            )));
        }
        return Ok(LocationTarget::Ssh {
            hostname: Some(hostname.to_string()),
            username,
            port,
            path: path.to_string(),
        });
    }

    if let Some((user_host, path)) = split_scp(raw) {
        let (username, hostname) = split_user_host(user_host);
        return Ok(LocationTarget::Ssh {
            hostname: Some(hostname.to_string()),
            username,
            port: None,
            path: path.to_string(),
        });
    }

    // Bare remote path; the host comes from the SSH configuration.
    Ok(LocationTarget::Ssh {
        hostname: None,
        username: None,
        port: None,
        path: raw.to_string(),
    })
}

fn parse_s3(raw: &str) -> StorageResult<LocationTarget> {
    let rest = raw.strip_prefix(S3_SCHEME).unwrap_or(raw);
    let (bucket, prefix) = match rest.split_once('/') {
        Some((bucket, prefix)) => (bucket, prefix.trim_start_matches('/')),
        None => (rest, ""),
    };

    if bucket.is_empty() {
        return Err(StorageOpError::Validation(format!(
            "S3 location '{}' is missing a bucket",
            raw
        )));
    }
    if !is_valid_bucket_name(bucket) {
        return Err(StorageOpError::Validation(format!(
            "'{}' is not a valid S3 bucket name",
            bucket
        )));
    }

    Ok(LocationTarget::S3 {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
    })
}

/// Lenient bucket check: S3-compatible providers accept more than AWS does (e.g. uppercase, `_`).
fn is_valid_bucket_name(bucket: &str) -> bool {
    (3..=63).contains(&bucket.len())
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn s3_uri_decomposes_into_bucket_and_prefix() {
        let loc = StorageLocation::parse("s3://my-bucket/data/2024/").unwrap();
        assert_eq!(loc.storage_type(), StorageType::S3);
        assert_eq!(
            loc.target(),
            &LocationTarget::S3 {
                bucket: "my-bucket".to_string(),
                prefix: "data/2024/".to_string(),
            }
        );

        let root = StorageLocation::parse("s3://bucket").unwrap();
        assert_eq!(
            root.target(),
            &LocationTarget::S3 {
                bucket: "bucket".to_string(),
                prefix: String::new(),
            }
        );
    }

    #[test]
    fn s3_uri_without_bucket_is_rejected() {
        let err = StorageLocation::parse("s3:///prefix").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn ssh_url_and_scp_forms() {
        let url = StorageLocation::parse("ssh://alice@server.example.com:2222/data").unwrap();
        assert_eq!(
            url.target(),
            &LocationTarget::Ssh {
                hostname: Some("server.example.com".to_string()),
                username: Some("alice".to_string()),
                port: Some(2222),
                path: "/data".to_string(),
            }
        );

        let scp = StorageLocation::parse("bob@server:/srv/share").unwrap();
        assert_eq!(scp.storage_type(), StorageType::Ssh);
        assert_eq!(
            scp.target(),
            &LocationTarget::Ssh {
                hostname: Some("server".to_string()),
                username: Some("bob".to_string()),
                port: None,
                path: "/srv/share".to_string(),
            }
        );
    }

    #[test]
    fn plain_paths_are_local() {
        for raw in ["/home/user/data", "./relative/path", "data", "C:\\data", "C:/data"] {
            let loc = StorageLocation::parse(raw).unwrap();
            assert_eq!(loc.storage_type(), StorageType::Local, "{}", raw);
        }
        let file = StorageLocation::parse("file:///tmp/x").unwrap();
        assert_eq!(
            file.target(),
            &LocationTarget::Local {
                path: PathBuf::from("/tmp/x")
            }
        );
    }

    #[test]
    fn explicit_type_wins_over_inference() {
        let loc = StorageLocation::resolve("/remote/path", Some(StorageType::Ssh)).unwrap();
        assert_eq!(
            loc.target(),
            &LocationTarget::Ssh {
                hostname: None,
                username: None,
                port: None,
                path: "/remote/path".to_string(),
            }
        );

        let bare = StorageLocation::resolve("bucket/prefix", Some(StorageType::S3)).unwrap();
        assert_eq!(bare.storage_type(), StorageType::S3);
    }

    #[test]
    fn unknown_scheme_is_unsupported() {
        let err = StorageLocation::parse("gs://bucket/data").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedStorageType);
    }

    #[test]
    fn empty_location_is_rejected() {
        let err = StorageLocation::parse("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
