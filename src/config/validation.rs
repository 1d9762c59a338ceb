//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject path setups that would let backups clobber the live file
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ManagerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }

    let daemon_config = &config.paths.daemon_config;
    if daemon_config.file_name().is_none() {
        errors.push(ValidationError::new(
            "paths.daemon_config",
            format!("must name a file: {}", daemon_config.display()),
        ));
    }
    if config.paths.backup_dir == *daemon_config {
        errors.push(ValidationError::new(
            "paths.backup_dir",
            "must not be the daemon config file",
        ));
    }

    if config.retention.max_count == Some(0) {
        errors.push(ValidationError::new(
            "retention.max_count",
            "must be at least 1",
        ));
    }
    if config.retention.max_age_days == Some(0) {
        errors.push(ValidationError::new(
            "retention.max_age_days",
            "must be at least 1",
        ));
    }

    let service = &config.service;
    for (field, cmd) in [
        ("service.status_cmd", &service.status_cmd),
        ("service.restart_cmd", &service.restart_cmd),
        ("service.restart_cmd_fallback", &service.restart_cmd_fallback),
    ] {
        if cmd.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }
    for (field, value) in [
        ("service.command_timeout_secs", service.command_timeout_secs),
        ("service.poll_interval_ms", service.poll_interval_ms),
        ("service.restart_deadline_secs", service.restart_deadline_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new(
            "security.max_body_size",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "not a socket address: {:?}",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
