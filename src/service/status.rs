//! Daemon run-state detection.
//!
//! The configured status command is authoritative. When it cannot answer
//! (nothing on stdout, something on stderr) a `pgrep -x dockerd` check is
//! used instead.

use std::time::Duration;

use serde::Serialize;

use crate::config::ServiceConfig;
use crate::service::command::{run_shell, CommandOutput};

const PROCESS_CHECK: &str = "pgrep -x dockerd";

/// Snapshot of the daemon's run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub message: String,
}

impl DaemonStatus {
    fn running(message: impl Into<String>) -> Self {
        Self {
            running: true,
            message: message.into(),
        }
    }

    fn stopped(message: impl Into<String>) -> Self {
        Self {
            running: false,
            message: message.into(),
        }
    }
}

/// Ask the system whether the daemon is running.
pub async fn probe_status(service: &ServiceConfig) -> DaemonStatus {
    let timeout = Duration::from_secs(service.command_timeout_secs);
    let out = run_shell(&service.status_cmd, timeout).await;

    match interpret(&out) {
        Some(status) => status,
        None => {
            tracing::debug!(stderr = %out.stderr, "Status command gave no answer, checking process table");
            let check = run_shell(PROCESS_CHECK, timeout).await;
            if check.success && !check.stdout.is_empty() {
                DaemonStatus::running("dockerd process detected")
            } else {
                DaemonStatus::stopped(out.stderr)
            }
        }
    }
}

/// Read a status command's output. `None` means the command could not
/// answer and the process table should be consulted.
fn interpret(out: &CommandOutput) -> Option<DaemonStatus> {
    let says_running = out.stdout.to_lowercase().contains("running");
    if out.success && says_running {
        return Some(DaemonStatus::running(out.stdout.clone()));
    }
    if !out.stdout.is_empty() {
        return Some(DaemonStatus::stopped(out.stdout.clone()));
    }
    if !out.stderr.is_empty() {
        return None;
    }
    Some(DaemonStatus::stopped("Container Manager is stopped"))
}
