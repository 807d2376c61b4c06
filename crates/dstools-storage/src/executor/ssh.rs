//! SSH executor
//!
//! Runs the rendered remote scripts through the system `ssh` client with key-based,
//! non-interactive authentication. One process per command; nothing is pooled.

use async_trait::async_trait;
use dstools_core::SshTarget;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use super::{
    render_remote_script, CommandExecutor, CommandOutput, ExecutorError, StorageCommand,
};

/// `ssh` exits with this status when the connection or authentication fails.
const SSH_TRANSPORT_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshExecutor {
    target: SshTarget,
    program: PathBuf,
}

impl SshExecutor {
    pub fn new(target: SshTarget) -> Self {
        Self {
            target,
            program: PathBuf::from("ssh"),
        }
    }

    /// Use a different client binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    fn command_for(&self, script: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-i")
            .arg(&self.target.key_path)
            .arg("-p")
            .arg(self.target.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.target.connect_timeout.as_secs().max(1)
            ))
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            // Nothing after this is parsed as an option.
            .arg("--")
            .arg(format!("{}@{}", self.target.username, self.target.hostname))
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Reject keys that are missing or readable by group/others; `ssh` would refuse them
/// anyway, with a less useful message.
pub(crate) fn check_private_key(key_path: &Path) -> Result<(), ExecutorError> {
    let metadata = std::fs::metadata(key_path).map_err(|e| {
        ExecutorError::InvalidKey(format!("cannot read '{}': {}", key_path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(ExecutorError::InvalidKey(format!(
            "'{}' is not a file",
            key_path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            return Err(ExecutorError::InvalidKey(format!(
                "'{}' has permissions {:04o}; expected 0600 or stricter",
                key_path.display(),
                mode
            )));
        }
    }

    Ok(())
}

#[async_trait]
impl CommandExecutor for SshExecutor {
    fn describe(&self) -> String {
        format!(
            "ssh://{}@{}:{}",
            self.target.username, self.target.hostname, self.target.port
        )
    }

    async fn run(
        &self,
        command: &StorageCommand,
        timeout: Duration,
    ) -> Result<CommandOutput, ExecutorError> {
        check_private_key(&self.target.key_path)?;

        let script = render_remote_script(command);
        let start = Instant::now();
        let child = self.command_for(&script).spawn().map_err(|e| {
            ExecutorError::Connection(format!(
                "failed to start {}: {}",
                self.program.display(),
                e
            ))
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecutorError::Timeout(timeout))?
            .map_err(|e| ExecutorError::Io(format!("failed to wait for ssh: {}", e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        tracing::debug!(
            host = %self.target.hostname,
            command = command.name(),
            exit_code = exit_code,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote command finished"
        );

        if exit_code == SSH_TRANSPORT_FAILURE {
            return Err(ExecutorError::Connection(format!(
                "{}@{}:{}: {}",
                self.target.username,
                self.target.hostname,
                self.target.port,
                stderr.trim()
            )));
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
            exit_code,
        })
    }
}
