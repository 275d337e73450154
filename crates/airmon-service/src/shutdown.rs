//! Shutdown capability behind the `/shutdown` endpoint.
//!
//! Handlers never shell out themselves; they call a [`ShutdownHandle`]
//! injected into [`AppState`](crate::AppState).

use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors from a shutdown request.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("Shutdown command is empty")]
    EmptyCommand,
    #[error("Failed to run shutdown command '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Shutdown command '{command}' failed with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Something that can stop the monitor.
#[async_trait]
pub trait ShutdownHandle: Send + Sync {
    /// Request shutdown. `Ok` means the request was accepted.
    async fn request_shutdown(&self) -> Result<(), ShutdownError>;
}

/// Stops this service gracefully by cancelling its token.
#[derive(Debug, Clone)]
pub struct ProcessShutdown {
    token: CancellationToken,
}

impl ProcessShutdown {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl ShutdownHandle for ProcessShutdown {
    async fn request_shutdown(&self) -> Result<(), ShutdownError> {
        info!("Shutdown requested, stopping service");
        self.token.cancel();
        Ok(())
    }
}

/// Runs a host command (e.g. `sudo shutdown -h now`), then stops this
/// service so the session log is closed.
#[derive(Debug, Clone)]
pub struct CommandShutdown {
    program: String,
    args: Vec<String>,
    token: CancellationToken,
}

impl CommandShutdown {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String], token: CancellationToken) -> Result<Self, ShutdownError> {
        let (program, args) = command.split_first().ok_or(ShutdownError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            token,
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl ShutdownHandle for CommandShutdown {
    async fn request_shutdown(&self) -> Result<(), ShutdownError> {
        let command = self.display();
        info!("Running shutdown command: {}", command);

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|source| ShutdownError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("Shutdown command failed with {}: {}", output.status, stderr);
            return Err(ShutdownError::Failed {
                command,
                status: output.status,
                stderr,
            });
        }

        self.token.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_process_shutdown_cancels_token() {
        let token = CancellationToken::new();
        let handle = ProcessShutdown::new(token.clone());
        handle.request_shutdown().await.unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let err = CommandShutdown::new(&[], CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ShutdownError::EmptyCommand));
    }

    #[tokio::test]
    async fn test_successful_command_cancels_token() {
        let token = CancellationToken::new();
        let handle = CommandShutdown::new(&command(&["true"]), token.clone()).unwrap();
        handle.request_shutdown().await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_failing_command_reports_stderr() {
        let token = CancellationToken::new();
        let handle = CommandShutdown::new(
            &command(&["sh", "-c", "echo not permitted >&2; exit 3"]),
            token.clone(),
        )
        .unwrap();

        let err = handle.request_shutdown().await.unwrap_err();
        assert!(err.to_string().contains("not permitted"));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let token = CancellationToken::new();
        let program = command(&["/nonexistent/shutdown", "-h"]);
        let handle = CommandShutdown::new(&program, token.clone()).unwrap();

        let err = handle.request_shutdown().await.unwrap_err();
        assert!(matches!(err, ShutdownError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/shutdown -h"));
        assert!(!token.is_cancelled());
    }
}
