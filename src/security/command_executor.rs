//! SafeCommandExecutor: whitelisted, async command execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved commands can execute
//! - **Injection prevention**: Arguments are passed as a vector, never through a shell
//! - **Secret environment**: Tokens are handed to the child through its
//!   environment, never on the command line
//! - **Working directory validation**: Validates existence before execution
//! - **Timeout control**: Hanging processes are killed
//!
//! # Example
//!
//! ```rust,no_run
//! use release_publisher::security::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), release_publisher::security::CommandError> {
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! executor.set_timeout(Duration::from_secs(30));
//!
//! let output = executor.execute("cargo", &["--version"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Commands the executor will run
const ALLOWED_COMMANDS: &[&str] = &["cargo"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// Command could not be started (binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
pub struct SafeCommandExecutor {
    working_dir: PathBuf,
    timeout: Option<Duration>,
    secret_env: Vec<(String, SecretString)>,
}

impl SafeCommandExecutor {
    /// Create an executor rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
            secret_env: Vec::new(),
        })
    }

    /// Set command execution timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Pass a secret to the child process as an environment variable
    pub fn set_secret_env(&mut self, key: impl Into<String>, value: SecretString) {
        self.secret_env.push((key.into(), value));
    }

    /// Run a whitelisted command and capture its output.
    ///
    /// A non-zero exit status is not an error here; callers inspect
    /// `Output::status` themselves.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - The process outlived the timeout and was killed
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        if !ALLOWED_COMMANDS.contains(&command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &self.secret_env {
            cmd.env(key, value.expose_secret());
        }

        tracing::debug!(
            command,
            args = ?args,
            working_dir = %self.working_dir.display(),
            "executing command"
        );

        let output = cmd.output();

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| CommandError::Timeout(limit))?,
            None => output.await,
        };

        result.map_err(|e| CommandError::ExecutionFailed(e.to_string()))
    }
}
