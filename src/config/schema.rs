//! Configuration schema definitions.
//!
//! This module defines the settings of the manager itself (not the daemon's
//! `dockerd.json`). All types derive Serde traits for deserialization from
//! a TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::daemon::{EngineSettings, RetentionPolicy};

/// Root configuration for the manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Web UI listener.
    pub listener: ListenerConfig,

    /// Live config file and backup directory.
    pub paths: PathsConfig,

    /// Backup retention.
    pub retention: RetentionConfig,

    /// Daemon service commands.
    pub service: ServiceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ManagerConfig {
    /// Engine settings derived from this configuration.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            config_path: self.paths.daemon_config.clone(),
            backup_dir: self.paths.backup_dir.clone(),
            retention: self.retention.policy(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// The daemon configuration file managed by this tool.
    pub daemon_config: PathBuf,

    /// Backup directory. Relative paths are resolved by the loader.
    pub backup_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            daemon_config: PathBuf::from("/var/packages/ContainerManager/etc/dockerd.json"),
            backup_dir: PathBuf::from("backups"),
        }
    }
}

/// Backup retention. Both limits unset keeps every backup.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RetentionConfig {
    /// Keep at most this many backups.
    pub max_count: Option<usize>,

    /// Delete backups older than this many days.
    pub max_age_days: Option<u32>,
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_count: self.max_count,
            max_age: self
                .max_age_days
                .map(|d| chrono::Duration::days(i64::from(d))),
        }
    }
}

/// Commands used to observe and restart the daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Status command; exit 0 with "running" in stdout means up.
    pub status_cmd: String,

    /// Primary (fast) restart command.
    pub restart_cmd: String,

    /// Fallback restart command for when the package is in a bad state.
    pub restart_cmd_fallback: String,

    /// systemd unit whose journal is streamed during a restart.
    pub journal_unit: Option<String>,

    /// Run `systemctl daemon-reload` before restarting.
    pub daemon_reload: bool,

    /// Timeout for a single command in seconds.
    pub command_timeout_secs: u64,

    /// Pause between the restart command and the first status check, in ms.
    pub settle_ms: u64,

    /// Interval between status checks in ms.
    pub poll_interval_ms: u64,

    /// Give up waiting for the daemon after this many seconds.
    pub restart_deadline_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            status_cmd: "/var/packages/ContainerManager/scripts/start-stop-status status".to_string(),
            restart_cmd: "systemctl restart pkg-ContainerManager-dockerd.service".to_string(),
            restart_cmd_fallback: "synopkg restart ContainerManager".to_string(),
            journal_unit: Some("pkg-ContainerManager-dockerd.service".to_string()),
            daemon_reload: true,
            command_timeout_secs: 30,
            settle_ms: 3000,
            poll_interval_ms: 1000,
            restart_deadline_secs: 300,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout for API calls in seconds. Does not apply to the
    /// restart log stream.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 256 * 1024, // 256KB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_container_manager() {
        let config = ManagerConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8888");
        assert!(config.paths.daemon_config.ends_with("dockerd.json"));
        assert!(config.retention.policy().is_unbounded());
        assert_eq!(config.service.restart_deadline_secs, 300);
    }

    #[test]
    fn test_partial_toml() {
        let config: ManagerConfig = toml::from_str(
            r#"
            [paths]
            daemon_config = "/tmp/dockerd.json"

            [retention]
            max_count = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.daemon_config, PathBuf::from("/tmp/dockerd.json"));
        assert_eq!(config.paths.backup_dir, PathBuf::from("backups"));
        assert_eq!(config.retention.policy().max_count, Some(20));
        assert_eq!(config.listener.bind_address, "0.0.0.0:8888");
    }
}
