//! dstools CLI
//!
//! Argument model, rendering, and the command runner behind the `dstools` binary.
//! Exit codes: 0 on success, 1 when an access check or batch entry came back negative,
//! and the error kind's own code (2-9) when an operation fails.

pub mod args;
pub mod output;

use args::{Command, OutputFormat};
use dstools_core::{Settings, StorageOpError, StorageResult};
use dstools_storage::{run_batch, BatchOperation, BatchOptions, UnifiedDispatcher};
use std::path::Path;

pub use args::Cli;

/// Access denied, or at least one batch entry failed.
pub const EXIT_NEGATIVE_RESULT: i32 = 1;

/// What a finished command prints to stdout, and how the process exits.
#[derive(Debug)]
pub struct CommandOutcome {
    pub stdout: String,
    pub exit_code: i32,
}

impl CommandOutcome {
    fn ok(stdout: String) -> Self {
        Self {
            stdout,
            exit_code: 0,
        }
    }
}

fn read_batch_file(path: &Path) -> StorageResult<Vec<BatchOperation>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        StorageOpError::Validation(format!("cannot read batch file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        StorageOpError::Validation(format!("invalid batch file {}: {}", path.display(), e))
    })
}

/// Run one parsed command against `dispatcher`.
pub async fn execute(
    command: Command,
    format: OutputFormat,
    dispatcher: &UnifiedDispatcher,
    settings: &Settings,
) -> StorageResult<CommandOutcome> {
    let default_timeout = settings.default_timeout();

    match command {
        Command::Analyze { target } => {
            let (location, config) = target.resolve(None)?;
            let timeout = target.timeout(default_timeout)?;
            let metrics = dispatcher.analyze(&location, &config, timeout).await?;
            Ok(CommandOutcome::ok(match format {
                OutputFormat::Text => output::metrics_text(&metrics),
                OutputFormat::Json => output::to_json(&metrics),
            }))
        }
        Command::List {
            target,
            content_type,
            max_items,
        } => {
            let (location, config) = target.resolve(None)?;
            let timeout = target.timeout(default_timeout)?;
            let max_items = max_items.unwrap_or(settings.max_items);
            let listing = dispatcher
                .list_contents(&location, &config, content_type, max_items, timeout)
                .await?;
            Ok(CommandOutcome::ok(match format {
                OutputFormat::Text => output::listing_text(&listing),
                OutputFormat::Json => output::to_json(&listing),
            }))
        }
        Command::VerifyAccess {
            target,
            operation,
            user,
        } => {
            let (location, config) = target.resolve(user)?;
            let timeout = target.timeout(default_timeout)?;
            let access = dispatcher
                .verify_access(&location, &config, operation, timeout)
                .await?;
            Ok(CommandOutcome {
                stdout: match format {
                    OutputFormat::Text => output::access_text(&access),
                    OutputFormat::Json => output::to_json(&access),
                },
                exit_code: if access.has_access() {
                    0
                } else {
                    EXIT_NEGATIVE_RESULT
                },
            })
        }
        Command::Batch { file, fail_fast } => {
            let operations = read_batch_file(&file)?;
            let options = BatchOptions {
                max_operations: settings.batch_max_operations,
                concurrency: settings.batch_max_operations,
                fail_fast,
                default_timeout,
                default_max_items: settings.max_items,
            };
            let report = run_batch(dispatcher, operations, &options).await?;
            Ok(CommandOutcome {
                stdout: match format {
                    OutputFormat::Text => output::batch_text(&report),
                    OutputFormat::Json => output::to_json(&output::batch_json(&report)),
                },
                exit_code: if report.failed == 0 {
                    0
                } else {
                    EXIT_NEGATIVE_RESULT
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dstools_core::{ErrorKind, ErrorMetadata};
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("logs")).unwrap();
        fs::write(dir.path().join("logs/app.log"), vec![b'l'; 2048]).unwrap();
        fs::write(dir.path().join("readme.md"), b"hello").unwrap();
        dir
    }

    async fn run(args: &[&str]) -> StorageResult<CommandOutcome> {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        execute(
            cli.command,
            cli.output,
            &UnifiedDispatcher::new(),
            &Settings::default(),
        )
        .await
    }

    #[tokio::test]
    async fn analyze_text_output() {
        let dir = tree();
        let path = dir.path().to_str().unwrap();
        let outcome = run(&["dstools", "analyze", path, "-t", "nfs"]).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stdout.contains("Items: 2"));
        assert!(outcome.stdout.contains("Total size: 2,053 bytes"));
        assert!(outcome.stdout.contains("Human readable: 2.00 KB"));
    }

    #[tokio::test]
    async fn list_json_output() {
        let dir = tree();
        let path = dir.path().to_str().unwrap();
        let outcome = run(&["dstools", "list", path, "--type", "files", "--output", "json"])
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&outcome.stdout).unwrap();
        assert_eq!(value["items"], serde_json::json!(["readme.md"]));
        assert_eq!(value["truncated"], false);
    }

    #[tokio::test]
    async fn local_write_check_exits_with_not_supported() {
        let dir = tree();
        let path = dir.path().to_str().unwrap();
        let err = run(&["dstools", "verify-access", path, "--operation", "write"])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert_eq!(err.exit_code(), 8);
    }

    #[tokio::test]
    async fn missing_location_exits_with_command_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");
        let err = run(&["dstools", "analyze", path.to_str().unwrap()])
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 9);
    }

    #[tokio::test]
    async fn batch_file_runs_every_entry() {
        let dir = tree();
        let batch = dir.path().join("batch.json");
        let ops = serde_json::json!([
            { "operation": "analyze", "location": dir.path().join("logs") },
            { "operation": "analyze", "location": dir.path().join("missing") },
            { "operation": "list", "location": dir.path(), "content_type": "subdirectories" }
        ]);
        fs::write(&batch, ops.to_string()).unwrap();

        let outcome = run(&["dstools", "batch", batch.to_str().unwrap()])
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, EXIT_NEGATIVE_RESULT);
        assert!(outcome.stdout.contains("#0 "));
        assert!(outcome.stdout.contains("1 items, 2.00 KB"));
        assert!(outcome.stdout.contains("COMMAND_EXECUTION_ERROR"));
        assert!(outcome.stdout.ends_with("2 succeeded, 1 failed, 0 skipped"));
    }

    #[tokio::test]
    async fn malformed_batch_file_is_a_validation_error() {
        let dir = TempDir::new().unwrap();
        let batch = dir.path().join("batch.json");
        fs::write(&batch, "{ not json").unwrap();
        let err = run(&["dstools", "batch", batch.to_str().unwrap()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.exit_code(), 2);
    }
}
