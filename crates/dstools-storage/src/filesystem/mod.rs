//! Filesystem analyzers
//!
//! [`LocalFilesystemAnalyzer`] and [`SshFilesystemAnalyzer`] differ only in the
//! [`CommandExecutor`] they drive; parsing and ACL evaluation live here and are shared.

pub mod acl;

use async_trait::async_trait;
use dstools_core::{
    AccessOperation, AccessResult, AclFlavor, ContentType, ListingResult, LocationTarget,
    StorageConfig, StorageLocation, StorageMetrics, StorageOpError, StorageResult, StorageType,
};
use std::path::PathBuf;
use std::time::Duration;

use crate::executor::{CommandExecutor, LocalExecutor, SshExecutor, StorageCommand};
use crate::traits::StorageAnalyzer;
use acl::{evaluate_nfs4, evaluate_posix, AclDecision};

fn parse_metrics(stdout: &str) -> StorageResult<(u64, u64)> {
    let line = stdout.trim();
    let parsed = line
        .split_once(',')
        .and_then(|(count, bytes)| Some((count.trim().parse().ok()?, bytes.trim().parse().ok()?)));
    parsed.ok_or_else(|| {
        StorageOpError::CommandExecution(format!("unexpected metrics output: '{}'", line))
    })
}

async fn collect_metrics(
    executor: &dyn CommandExecutor,
    path: &str,
    timeout: Duration,
) -> StorageResult<(u64, u64)> {
    let command = StorageCommand::Metrics {
        path: path.to_string(),
    };
    let output = executor.run(&command, timeout).await?.into_checked(path)?;
    parse_metrics(&output.stdout)
}

/// Fetch one entry past the cap so truncation reflects whether more entries exist.
async fn collect_children(
    executor: &dyn CommandExecutor,
    path: &str,
    content_type: ContentType,
    max_items: usize,
    timeout: Duration,
) -> StorageResult<(Vec<String>, bool)> {
    let command = StorageCommand::ListChildren {
        path: path.to_string(),
        content_type,
        limit: max_items.saturating_add(1),
    };
    let output = executor.run(&command, timeout).await?.into_checked(path)?;

    let mut names: Vec<String> = output
        .stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    let truncated = names.len() > max_items;
    names.truncate(max_items);
    names.sort();
    Ok((names, truncated))
}

async fn check_read_access(
    executor: &dyn CommandExecutor,
    path: &str,
    flavor: AclFlavor,
    username: &str,
    timeout: Duration,
) -> StorageResult<AclDecision> {
    let command = StorageCommand::Acl {
        path: path.to_string(),
        flavor,
    };
    let output = executor.run(&command, timeout).await?.into_checked(path)?;
    Ok(match flavor {
        AclFlavor::Posix => evaluate_posix(&output.stdout, username),
        AclFlavor::Nfs4 => evaluate_nfs4(&output.stdout, username),
    })
}

fn verification_method(flavor: AclFlavor) -> String {
    let family = match flavor {
        AclFlavor::Posix => "posix-acl",
        AclFlavor::Nfs4 => "nfs4-acl",
    };
    format!("{}:{}", family, flavor.tool())
}

fn write_not_supported(storage_type: StorageType) -> StorageOpError {
    StorageOpError::NotSupported(format!(
        "write verification is not available for {} filesystem locations",
        storage_type
    ))
}

/// The principal whose access is evaluated when none is configured.
fn invoking_user() -> Option<String> {
    ["USER", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

/// Local filesystem analyzer (including NFS mounts).
#[derive(Debug, Clone, Default)]
pub struct LocalFilesystemAnalyzer {
    executor: LocalExecutor,
}

impl LocalFilesystemAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    fn local_path(location: &StorageLocation) -> StorageResult<String> {
        match location.target() {
            LocationTarget::Local { path } => Ok(path.to_string_lossy().into_owned()),
            _ => Err(StorageOpError::Validation(format!(
                "location '{}' is not a local path",
                location
            ))),
        }
    }
}

#[async_trait]
impl StorageAnalyzer for LocalFilesystemAnalyzer {
    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }

    async fn analyze(
        &self,
        location: &StorageLocation,
        _config: &StorageConfig,
        timeout: Duration,
    ) -> StorageResult<StorageMetrics> {
        let path = Self::local_path(location)?;
        let (count, bytes) = collect_metrics(&self.executor, &path, timeout).await?;
        Ok(StorageMetrics::new(
            location.raw(),
            StorageType::Local,
            count,
            bytes,
        ))
    }

    async fn list_contents(
        &self,
        location: &StorageLocation,
        _config: &StorageConfig,
        content_type: ContentType,
        max_items: usize,
        timeout: Duration,
    ) -> StorageResult<ListingResult> {
        let path = Self::local_path(location)?;
        let (items, truncated) =
            collect_children(&self.executor, &path, content_type, max_items, timeout).await?;
        Ok(ListingResult::new(
            location.raw(),
            StorageType::Local,
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
        timeout: Duration,
    ) -> StorageResult<AccessResult> {
        if operation == AccessOperation::Write {
            return Err(write_not_supported(StorageType::Local));
        }
        let local = match config {
            StorageConfig::Local(local) => local.clone(),
            _ => Default::default(),
        };
        let username = local.username.clone().or_else(invoking_user).ok_or_else(|| {
            StorageOpError::Validation(
                "cannot determine the user to check; set a username".to_string(),
            )
        })?;

        let path = Self::local_path(location)?;
        let decision =
            check_read_access(&self.executor, &path, local.acl_flavor, &username, timeout).await?;

        tracing::debug!(
            location = %location,
            username = %username,
            granted = decision.granted,
            "Evaluated local ACL"
        );

        Ok(AccessResult::new(
            location.raw(),
            StorageType::Local,
            operation,
            decision.granted,
            verification_method(local.acl_flavor),
            Some(format!("{} ({})", decision.reason, username)),
        ))
    }
}

/// Remote filesystem analyzer over SSH.
#[derive(Debug, Clone, Default)]
pub struct SshFilesystemAnalyzer {
    program: Option<PathBuf>,
}

impl SshFilesystemAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `ssh` client binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    fn executor(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
    ) -> StorageResult<(SshExecutor, String)> {
        let StorageConfig::Ssh(ssh) = config else {
            return Err(StorageOpError::InvalidCredentials(
                "SSH locations require an SSH configuration".to_string(),
            ));
        };
        let (target, path) = ssh.target_for(location)?;
        let executor = match &self.program {
            Some(program) => SshExecutor::new(target).with_program(program.clone()),
            None => SshExecutor::new(target),
        };
        Ok((executor, path))
    }
}

#[async_trait]
impl StorageAnalyzer for SshFilesystemAnalyzer {
    fn storage_type(&self) -> StorageType {
        StorageType::Ssh
    }

    async fn analyze(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        timeout: Duration,
    ) -> StorageResult<StorageMetrics> {
        let (executor, path) = self.executor(location, config)?;
        let (count, bytes) = collect_metrics(&executor, &path, timeout).await?;
        Ok(StorageMetrics::new(location.raw(), StorageType::Ssh, count, bytes))
    }

    async fn list_contents(
        &self,
        location: &StorageLocation,
        config: &StorageConfig,
        content_type: ContentType,
        max_items: usize,
        timeout: Duration,
    ) -> StorageResult<ListingResult> {
        let (executor, path) = self.executor(location, config)?;
        let (items, truncated) =
            collect_children(&executor, &path, content_type, max_items, timeout).await?;
        Ok(ListingResult::new(
            location.raw(),
            StorageType::Ssh,
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
        timeout: Duration,
    ) -> StorageResult<AccessResult> {
        if operation == AccessOperation::Write {
            return Err(write_not_supported(StorageType::Ssh));
        }
        let (executor, path) = self.executor(location, config)?;
        let flavor = executor.target().acl_flavor;
        let username = executor.target().username.clone();

        let decision = check_read_access(&executor, &path, flavor, &username, timeout).await?;

        tracing::debug!(
            location = %location,
            remote = %executor.describe(),
            granted = decision.granted,
            "Evaluated remote ACL"
        );

        Ok(AccessResult::new(
            location.raw(),
            StorageType::Ssh,
            operation,
            decision.granted,
            verification_method(flavor),
            Some(format!("{} ({})", decision.reason, username)),
        ))
    }
}
