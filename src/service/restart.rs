//! Daemon restart with a live log.
//!
//! # Responsibilities
//! - Run at most one restart at a time
//! - Stream the unit's journal and progress lines to any number of viewers
//! - Poll the status command until the daemon is back or a deadline passes
//! - Let the user stop watching without killing the restart command itself
//!
//! # Data Flow
//! ```text
//! start() → spawn run()
//!     → journalctl -f (forwarded line by line)
//!     → systemctl daemon-reload (optional)
//!     → restart command
//!     → settle, then poll status until running or deadline
//!     → Done event
//! subscribe() → (backlog of this run, live receiver)
//! ```
//!
//! Viewers that connect late replay the backlog, so a page refresh during a
//! restart still shows the whole log.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ServiceConfig;
use crate::observability::metrics;
use crate::service::command::run_shell;
use crate::service::status::probe_status;

const EVENT_CAPACITY: usize = 256;
const STATUS_REPORT_EVERY: u32 = 5;

/// One item of the restart log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestartEvent {
    Line { text: String },
    Done { success: bool },
}

impl RestartEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestartError {
    #[error("a restart is already in progress")]
    AlreadyRunning,
}

/// Single-flight restart runner.
pub struct RestartCoordinator {
    service: ServiceConfig,
    running: AtomicBool,
    backlog: Mutex<Vec<RestartEvent>>,
    events: broadcast::Sender<RestartEvent>,
    cancel: watch::Sender<bool>,
}

impl RestartCoordinator {
    pub fn new(service: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (cancel, _) = watch::channel(false);
        Self {
            service,
            running: AtomicBool::new(false),
            backlog: Mutex::new(Vec::new()),
            events,
            cancel,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a restart in the background. `fallback` selects the slower
    /// package-manager restart command.
    pub fn start(self: &Arc<Self>, fallback: bool) -> Result<(), RestartError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RestartError::AlreadyRunning);
        }

        self.backlog().clear();
        self.cancel.send_replace(false);

        let cmd = if fallback {
            self.service.restart_cmd_fallback.clone()
        } else {
            self.service.restart_cmd.clone()
        };
        tracing::info!(command = %cmd, fallback, "Starting daemon restart");

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(cmd).await });
        Ok(())
    }

    /// Stop watching. The restart command already sent is not undone.
    pub fn stop(&self) {
        if self.is_running() {
            self.cancel.send_replace(true);
        } else {
            self.line("Monitoring stopped by user");
            self.emit(RestartEvent::Done { success: false });
        }
    }

    /// Events of the current (or last) run so far, plus a receiver for the
    /// rest. Taken under one lock so nothing falls between the two.
    pub fn subscribe(&self) -> (Vec<RestartEvent>, broadcast::Receiver<RestartEvent>) {
        let backlog = self.backlog();
        (backlog.clone(), self.events.subscribe())
    }

    async fn run(self: Arc<Self>, cmd: String) {
        let _running = RunningGuard(&self.running);
        let mut cancel = self.cancel.subscribe();

        let outcome = tokio::select! {
            ok = self.sequence(&cmd) => if ok { "ok" } else { "failed" },
            _ = cancel.wait_for(|stopped| *stopped) => {
                self.line("Monitoring stopped by user");
                "cancelled"
            }
        };

        tracing::info!(outcome, "Daemon restart finished");
        metrics::record_restart(outcome);
        self.emit(RestartEvent::Done {
            success: outcome == "ok",
        });
    }

    async fn sequence(self: &Arc<Self>, cmd: &str) -> bool {
        let service = &self.service;
        let timeout = Duration::from_secs(service.command_timeout_secs);

        let _journal = match service.journal_unit.as_deref() {
            Some(unit) => self.follow_journal(unit),
            None => None,
        };

        if service.daemon_reload {
            self.line("Running: systemctl daemon-reload");
            let out = run_shell("systemctl daemon-reload", timeout).await;
            if out.success {
                self.line("daemon-reload finished");
            } else {
                self.line(format!("daemon-reload warning: {}", out.stderr));
            }
        }

        self.line(format!("Running: {}", cmd));
        let out = run_shell(cmd, timeout).await;
        if !out.stdout.is_empty() {
            self.line(format!("[output] {}", out.stdout));
        }
        if !out.stderr.is_empty() {
            self.line(format!("[error] {}", out.stderr));
        }
        if out.success {
            self.line("Restart command sent");
        } else {
            self.line("Restart command failed, watching service status anyway");
        }

        self.line("Watching service status...");
        tokio::time::sleep(Duration::from_millis(service.settle_ms)).await;

        let deadline = Instant::now() + Duration::from_secs(service.restart_deadline_secs);
        let poll = Duration::from_millis(service.poll_interval_ms);
        let mut checks = 0u32;
        loop {
            checks += 1;
            let status = probe_status(service).await;
            if status.running {
                self.line("Container Manager restarted successfully");
                return true;
            }
            if checks % STATUS_REPORT_EVERY == 0 {
                self.line(format!("Status check #{}: {}", checks, status.message));
            }
            if Instant::now() >= deadline {
                self.line(format!(
                    "Daemon not running after {}s, giving up",
                    service.restart_deadline_secs
                ));
                return false;
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Forward `journalctl -f` output until the returned guard drops.
    fn follow_journal(self: &Arc<Self>, unit: &str) -> Option<AbortOnDrop> {
        let spawned = Command::new("journalctl")
            .args(["-u", unit, "-f", "-n", "0"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(c) => c,
            Err(e) => {
                self.line(format!("Journal monitor unavailable: {}", e));
                return None;
            }
        };
        let stdout = child.stdout.take()?;
        self.line(format!("Following journal of {}", unit));

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                this.emit(RestartEvent::Line {
                    text: format!("[journalctl] {}", line),
                });
            }
        });
        Some(AbortOnDrop(handle))
    }

    fn line(&self, text: impl std::fmt::Display) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.emit(RestartEvent::Line {
            text: format!("[{}] {}", stamp, text),
        });
    }

    fn emit(&self, event: RestartEvent) {
        let mut backlog = self.backlog();
        backlog.push(event.clone());
        // No viewers is fine; the backlog keeps the event.
        let _ = self.events.send(event);
    }

    fn backlog(&self) -> MutexGuard<'_, Vec<RestartEvent>> {
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(status_cmd: &str, settle_ms: u64, deadline_secs: u64) -> ServiceConfig {
        ServiceConfig {
            status_cmd: status_cmd.into(),
            restart_cmd: "echo restarted".into(),
            restart_cmd_fallback: "echo fallback".into(),
            journal_unit: None,
            daemon_reload: false,
            command_timeout_secs: 5,
            settle_ms,
            poll_interval_ms: 20,
            restart_deadline_secs: deadline_secs,
        }
    }

    async fn collect(coordinator: &RestartCoordinator) -> Vec<RestartEvent> {
        let (mut events, mut rx) = coordinator.subscribe();
        while !events.last().is_some_and(RestartEvent::is_done) {
            match tokio::time::timeout(Duration::from_secs(10), rx.recv()).await {
                Ok(Ok(event)) => events.push(event),
                other => panic!("restart log ended early: {:?}", other),
            }
        }
        events
    }

    fn text(events: &[RestartEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                RestartEvent::Line { text } => Some(text.as_str()),
                RestartEvent::Done { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_successful_restart() {
        let coordinator = Arc::new(RestartCoordinator::new(service("echo running", 0, 5)));
        coordinator.start(false).unwrap();

        let events = collect(&coordinator).await;
        assert_eq!(events.last(), Some(&RestartEvent::Done { success: true }));
        let log = text(&events);
        assert!(log.contains("[output] restarted"));
        assert!(log.contains("restarted successfully"));
    }

    #[tokio::test]
    async fn test_fallback_command() {
        let coordinator = Arc::new(RestartCoordinator::new(service("echo running", 0, 5)));
        coordinator.start(true).unwrap();

        let log = text(&collect(&coordinator).await);
        assert!(log.contains("[output] fallback"));
    }

    #[tokio::test]
    async fn test_gives_up_at_deadline() {
        let coordinator = Arc::new(RestartCoordinator::new(service("echo stopped", 0, 1)));
        coordinator.start(false).unwrap();

        let events = collect(&coordinator).await;
        assert_eq!(events.last(), Some(&RestartEvent::Done { success: false }));
        assert!(text(&events).contains("giving up"));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let coordinator = Arc::new(RestartCoordinator::new(service("echo running", 300, 5)));
        coordinator.start(false).unwrap();
        assert_eq!(coordinator.start(false), Err(RestartError::AlreadyRunning));

        collect(&coordinator).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!coordinator.is_running());
        coordinator.start(false).unwrap();
        collect(&coordinator).await;
    }

    #[tokio::test]
    async fn test_stop_ends_stream() {
        let coordinator = Arc::new(RestartCoordinator::new(service("echo stopped", 0, 60)));
        coordinator.start(false).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        coordinator.stop();

        let events = collect(&coordinator).await;
        assert_eq!(events.last(), Some(&RestartEvent::Done { success: false }));
        assert!(text(&events).contains("stopped by user"));
    }

    #[tokio::test]
    async fn test_stop_when_idle_closes_viewers() {
        let coordinator = RestartCoordinator::new(service("echo running", 0, 5));
        coordinator.stop();
        let (events, _) = coordinator.subscribe();
        assert!(events.last().is_some_and(RestartEvent::is_done));
    }
}
