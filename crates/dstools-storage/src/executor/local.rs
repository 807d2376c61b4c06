//! In-process executor for the local filesystem
//!
//! Metrics and listings walk the tree with `walkdir` on the blocking pool; ACL queries
//! shell out to the ACL tool. Output follows the same text format as the remote
//! scripts so parsing is shared.

use async_trait::async_trait;
use dstools_core::{AclFlavor, ContentType};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use walkdir::WalkDir;

use super::{
    CommandExecutor, CommandOutput, ExecutorError, StorageCommand, EXIT_NOT_A_DIRECTORY,
    EXIT_NOT_FOUND, EXIT_PERMISSION_DENIED, EXIT_TOOL_MISSING,
};

/// Entries visited between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    fn describe(&self) -> String {
        "local".to_string()
    }

    async fn run(
        &self,
        command: &StorageCommand,
        timeout: Duration,
    ) -> Result<CommandOutput, ExecutorError> {
        match command {
            StorageCommand::Metrics { path } => {
                let root = PathBuf::from(path);
                // Too far out to represent means no walk deadline.
                let deadline = Instant::now().checked_add(timeout);
                blocking(move || directory_totals(&root, deadline)).await
            }
            StorageCommand::ListChildren {
                path,
                content_type,
                limit,
            } => {
                let root = PathBuf::from(path);
                let content_type = *content_type;
                let limit = *limit;
                blocking(move || list_children(&root, content_type, limit)).await
            }
            StorageCommand::Acl { path, flavor } => {
                let mut output = run_tool(flavor.tool(), path, timeout).await?;
                if *flavor == AclFlavor::Nfs4 && output.is_success() {
                    if let Some(owner) = file_owner(path, timeout).await {
                        output.stdout = format!("# owner: {}\n{}", owner, output.stdout);
                    }
                }
                Ok(output)
            }
        }
    }
}

async fn blocking<F>(task: F) -> Result<CommandOutput, ExecutorError>
where
    F: FnOnce() -> Result<CommandOutput, ExecutorError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ExecutorError::Io(format!("filesystem task failed: {}", e)))?
}

/// Check the root the way the remote preflight does.
fn preflight(root: &Path) -> Option<CommandOutput> {
    let display = root.display();
    let metadata = match fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Some(CommandOutput::failure(
                EXIT_NOT_FOUND,
                format!("no such file or directory: {}", display),
            ))
        }
        Err(e) if e.kind() == IoErrorKind::PermissionDenied => {
            return Some(CommandOutput::failure(
                EXIT_PERMISSION_DENIED,
                format!("permission denied: {}", display),
            ))
        }
        Err(e) => return Some(CommandOutput::failure(1, format!("{}: {}", display, e))),
    };
    if !metadata.is_dir() {
        return Some(CommandOutput::failure(
            EXIT_NOT_A_DIRECTORY,
            format!("not a directory: {}", display),
        ));
    }
    match fs::read_dir(root) {
        Ok(_) => None,
        Err(e) if e.kind() == IoErrorKind::PermissionDenied => Some(CommandOutput::failure(
            EXIT_PERMISSION_DENIED,
            format!("permission denied: {}", display),
        )),
        Err(e) => Some(CommandOutput::failure(1, format!("{}: {}", display, e))),
    }
}

/// Count regular files and sum their sizes. Symlinks below the root are not followed;
/// unreadable subtrees are skipped. `None` for `deadline` means no limit.
fn directory_totals(
    root: &Path,
    deadline: Option<Instant>,
) -> Result<CommandOutput, ExecutorError> {
    if let Some(failed) = preflight(root) {
        return Ok(failed);
    }

    let start = Instant::now();
    let mut visited: u64 = 0;
    let mut count: u64 = 0;
    let mut bytes: u64 = 0;

    for entry in WalkDir::new(root).follow_links(false) {
        visited += 1;
        if visited % DEADLINE_CHECK_INTERVAL == 0
            && deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            return Err(ExecutorError::Timeout(start.elapsed()));
        }

        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            count += 1;
            bytes = bytes.saturating_add(metadata.len());
        }
    }

    Ok(CommandOutput::success(format!("{},{}\n", count, bytes)))
}

/// Immediate children of one kind, at most `limit` names, in directory order.
fn list_children(
    root: &Path,
    content_type: ContentType,
    limit: usize,
) -> Result<CommandOutput, ExecutorError> {
    if let Some(failed) = preflight(root) {
        return Ok(failed);
    }

    let entries = fs::read_dir(root).map_err(|e| ExecutorError::Io(e.to_string()))?;
    let mut names = Vec::new();
    for entry in entries.flatten() {
        if names.len() >= limit {
            break;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let wanted = match content_type {
            ContentType::Subdirectories => file_type.is_dir(),
            ContentType::Files => file_type.is_file(),
        };
        if !wanted {
            continue;
        }
        let raw_name = entry.file_name();
        let name = match raw_name.to_str() {
            Some(name) => name.to_string(),
            None => {
                let lossy = raw_name.to_string_lossy().into_owned();
                tracing::debug!(name = %lossy, "Listing non-UTF-8 name lossily");
                lossy
            }
        };
        // One name per line; a newline inside a name cannot be represented.
        if name.contains('\n') {
            tracing::debug!(name = ?name, "Skipping name containing a newline");
            continue;
        }
        names.push(name);
    }

    let mut stdout = names.join("\n");
    if !stdout.is_empty() {
        stdout.push('\n');
    }
    Ok(CommandOutput::success(stdout))
}

async fn run_tool(
    tool: &str,
    path: &str,
    timeout: Duration,
) -> Result<CommandOutput, ExecutorError> {
    let mut command = Command::new(tool);
    if tool == "getfacl" {
        command.arg("-p");
    }
    command
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Ok(CommandOutput::failure(
                EXIT_TOOL_MISSING,
                format!("{}: not installed", tool),
            ))
        }
        Err(e) => return Err(ExecutorError::Io(format!("failed to run {}: {}", tool, e))),
    };

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| ExecutorError::Timeout(timeout))?
        .map_err(|e| ExecutorError::Io(format!("failed to wait for {}: {}", tool, e)))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Owner name for `OWNER@` entries; `None` leaves them unmatched.
async fn file_owner(path: &str, timeout: Duration) -> Option<String> {
    let output = tokio::time::timeout(
        timeout,
        Command::new("stat")
            .args(["-c", "%U", path])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;
    if !output.status.success() {
        tracing::debug!(path = %path, "Could not resolve owner for NFSv4 ACL");
        return None;
    }
    let owner = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!owner.is_empty()).then_some(owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn metrics_command(path: &Path) -> StorageCommand {
        StorageCommand::Metrics {
            path: path.to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn metrics_count_nested_and_hidden_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        File::create(dir.path().join("one.txt"))
            .unwrap()
            .write_all(&[0u8; 10])
            .unwrap();
        File::create(dir.path().join("a/b/two.bin"))
            .unwrap()
            .write_all(&[0u8; 32])
            .unwrap();
        File::create(dir.path().join(".hidden"))
            .unwrap()
            .write_all(b"x")
            .unwrap();

        let output = LocalExecutor::new()
            .run(&metrics_command(dir.path()), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "3,43");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn metrics_skip_symlinks() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        File::create(outside.path().join("big"))
            .unwrap()
            .write_all(&[0u8; 100])
            .unwrap();
        File::create(dir.path().join("real"))
            .unwrap()
            .write_all(&[0u8; 5])
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked-dir")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("linked-file"))
            .unwrap();

        let output = LocalExecutor::new()
            .run(&metrics_command(dir.path()), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "1,5");
    }

    #[tokio::test]
    async fn unbounded_timeout_still_walks() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("one.txt"))
            .unwrap()
            .write_all(&[0u8; 6])
            .unwrap();

        let output = LocalExecutor::new()
            .run(&metrics_command(dir.path()), Duration::from_secs(u64::MAX))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "1,6");
    }

    #[tokio::test]
    async fn missing_root_reports_not_found_status() {
        let dir = tempdir().unwrap();
        let output = LocalExecutor::new()
            .run(&metrics_command(&dir.path().join("absent")), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.exit_code, EXIT_NOT_FOUND);
    }

    #[tokio::test]
    async fn file_root_reports_not_a_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        File::create(&file).unwrap();
        let output = LocalExecutor::new()
            .run(&metrics_command(&file), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.exit_code, EXIT_NOT_A_DIRECTORY);
    }

    #[tokio::test]
    async fn listing_respects_kind_and_limit() {
        let dir = tempdir().unwrap();
        for name in ["d1", "d2", "d3"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        File::create(dir.path().join("f1")).unwrap();

        let executor = LocalExecutor::new();
        let dirs = executor
            .run(
                &StorageCommand::ListChildren {
                    path: dir.path().to_string_lossy().into_owned(),
                    content_type: ContentType::Subdirectories,
                    limit: 2,
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(dirs.stdout.lines().count(), 2);

        let files = executor
            .run(
                &StorageCommand::ListChildren {
                    path: dir.path().to_string_lossy().into_owned(),
                    content_type: ContentType::Files,
                    limit: 10,
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(files.stdout, "f1\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn names_with_newlines_are_left_out() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("two\nlines")).unwrap();
        File::create(dir.path().join("plain")).unwrap();

        let output = LocalExecutor::new()
            .run(
                &StorageCommand::ListChildren {
                    path: dir.path().to_string_lossy().into_owned(),
                    content_type: ContentType::Files,
                    limit: 10,
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(output.stdout, "plain\n");
    }
}
