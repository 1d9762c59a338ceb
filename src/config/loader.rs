//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::ManagerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment variable {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Directory holding `dockerd.json`.
pub const ENV_CORE_CONFIG: &str = "DOCKER_CORE_CONFIG";
pub const ENV_BACKUP_PATH: &str = "BACKUP_PATH";
pub const ENV_PORT: &str = "PORT";
pub const ENV_STATUS_CMD: &str = "DOCKER_STATUS_CMD";
pub const ENV_RESTART_CMD: &str = "DOCKER_RESTART_CMD";
pub const ENV_RESTART_CMD_FALLBACK: &str = "DOCKER_RESTART_CMD_FALLBACK";

/// Load, apply environment overrides and validate.
///
/// Without a file the defaults are used. Relative backup directories are
/// resolved against the config file's directory, or the working directory.
pub fn load_config(path: Option<&Path>) -> Result<ManagerConfig, ConfigError> {
    let (mut config, base) = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            let config: ManagerConfig = toml::from_str(&content)?;
            let base = match p.parent().filter(|d| !d.as_os_str().is_empty()) {
                Some(dir) => dir.to_path_buf(),
                None => std::env::current_dir()?,
            };
            (config, base)
        }
        None => (ManagerConfig::default(), std::env::current_dir()?),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    resolve_paths(&mut config, &base);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the environment variables understood by the package installer.
pub fn apply_env_overrides<F>(config: &mut ManagerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(dir) = get(ENV_CORE_CONFIG) {
        config.paths.daemon_config = PathBuf::from(dir).join("dockerd.json");
    }
    if let Some(dir) = get(ENV_BACKUP_PATH) {
        config.paths.backup_dir = PathBuf::from(dir);
    }
    if let Some(port) = get(ENV_PORT) {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_PORT,
            message: format!("not a port number: {:?}", port),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(cmd) = get(ENV_STATUS_CMD) {
        config.service.status_cmd = cmd;
    }
    if let Some(cmd) = get(ENV_RESTART_CMD) {
        config.service.restart_cmd = cmd;
    }
    if let Some(cmd) = get(ENV_RESTART_CMD_FALLBACK) {
        config.service.restart_cmd_fallback = cmd;
    }
    Ok(())
}

fn resolve_paths(config: &mut ManagerConfig, base: &Path) {
    if config.paths.backup_dir.is_relative() {
        config.paths.backup_dir = base.join(&config.paths.backup_dir);
    }
}
