//! Error definitions for the configuration engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by [`ConfigEngine`](super::ConfigEngine) and
/// [`BackupStore`](super::BackupStore).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The live configuration is missing, unreadable or not a JSON object.
    #[error("configuration {path} is unreadable: {reason}")]
    ConfigUnreadable { path: PathBuf, reason: String },

    /// An editable field failed its validation rule.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidFieldValue { key: String, reason: String },

    /// The atomic replace of the live file did not complete.
    #[error("failed to write configuration {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pre-write snapshot could not be persisted.
    #[error("failed to write backup {id}: {source}")]
    BackupWriteFailed {
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// No backup exists under the given identifier.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// The backup exists but does not hold a valid document.
    #[error("backup {id} is corrupted: {reason}")]
    BackupCorrupted { id: String, reason: String },

    /// Listing or deleting in the backup directory failed.
    #[error("backup directory {path} is not accessible: {source}")]
    BackupStoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ConfigUnreadable { .. } => "config_unreadable",
            EngineError::InvalidFieldValue { .. } => "invalid_field_value",
            EngineError::WriteFailed { .. } => "write_failed",
            EngineError::BackupWriteFailed { .. } => "backup_write_failed",
            EngineError::BackupNotFound(_) => "backup_not_found",
            EngineError::BackupCorrupted { .. } => "backup_corrupted",
            EngineError::BackupStoreIo { .. } => "backup_store_io",
        }
    }

    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidFieldValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::invalid("registry-mirrors", "expected a list of URLs");
        assert_eq!(
            err.to_string(),
            "invalid value for `registry-mirrors`: expected a list of URLs"
        );
        assert_eq!(err.kind(), "invalid_field_value");

        let err = EngineError::BackupNotFound("20250101_120000".into());
        assert!(err.to_string().contains("20250101_120000"));
        assert_eq!(err.kind(), "backup_not_found");
    }

    #[test]
    fn test_io_source_is_exposed() {
        use std::error::Error as _;

        let err = EngineError::WriteFailed {
            path: PathBuf::from("/etc/dockerd.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert_eq!(err.kind(), "write_failed");
    }
}
