//! Shell command execution with a timeout.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Captured result of a finished (or abandoned) command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status was zero.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `cmd` through `sh -c`. Spawn failures and timeouts are reported as
/// an unsuccessful output with the reason in `stderr`.
pub async fn run_shell(cmd: &str, timeout: Duration) -> CommandOutput {
    let child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(command = %cmd, error = %e, "Failed to spawn command");
            return CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: e.to_string(),
            };
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        },
        Ok(Err(e)) => CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: e.to_string(),
        },
        Err(_) => {
            tracing::warn!(command = %cmd, timeout_secs = timeout.as_secs(), "Command timed out");
            CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: format!("command timed out after {}s", timeout.as_secs()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output() {
        let out = run_shell("echo hello; echo oops >&2", Duration::from_secs(5)).await;
        assert!(out.success);
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let out = run_shell("exit 3", Duration::from_secs(5)).await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn test_timeout() {
        let out = run_shell("sleep 5", Duration::from_millis(100)).await;
        assert!(!out.success);
        assert!(out.stderr.contains("timed out"));
    }
}
