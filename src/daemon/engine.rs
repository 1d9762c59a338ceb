//! Read, edit, back up and roll back the live daemon configuration.
//!
//! # Design Decisions
//! - All writes end in `ConfigEngine::replace`: snapshot of the previous
//!   state, then atomic replace, under the write lock
//! - Planning is pure; a validation failure happens before any side effect
//! - Rollback resolves its backup before reading the live file, so it can
//!   repair a file that no longer parses
//! - A failed live write removes the snapshot taken for it, so a failed
//!   call leaves the backup set as it found it
//! - No lock is held between calls; readers never lock

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::daemon::backup::{BackupRecord, BackupStore, RetentionPolicy};
use crate::daemon::document::ConfigDocument;
use crate::daemon::error::{EngineError, EngineResult};
use crate::daemon::schema::{ConfigSchema, FieldClass, FieldSpec};
use crate::daemon::storage::{LocalFs, Storage};
use crate::observability::metrics;

/// Locations the engine operates on, supplied at construction.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// The live `dockerd.json`.
    pub config_path: PathBuf,
    /// Directory holding backup snapshots.
    pub backup_dir: PathBuf,
    /// Applied after every successful write.
    pub retention: RetentionPolicy,
}

/// What the live file held before a write.
enum LiveState {
    Parsed(ConfigDocument),
    /// Present but not a JSON object.
    Raw(Vec<u8>),
    Missing,
}

/// Metadata of the live file for status display.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub size: u64,
    pub last_modified: Option<DateTime<Local>>,
}

/// An editable field with its current value.
#[derive(Debug, Clone, Serialize)]
pub struct EditableField {
    #[serde(flatten)]
    pub spec: FieldSpec,
    pub value: Option<Value>,
}

/// A key shown for information only.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedField {
    pub key: String,
    pub value: Value,
    /// `false` for keys this tool does not know about.
    pub known: bool,
}

/// Read-only projection of the live document for the edit form.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub editable: Vec<EditableField>,
    pub protected: Vec<ProtectedField>,
}

/// Safe mutation engine for one configuration file.
pub struct ConfigEngine {
    config_path: PathBuf,
    schema: ConfigSchema,
    backups: BackupStore,
    storage: Arc<dyn Storage>,
    retention: RetentionPolicy,
    write_lock: Mutex<()>,
}

impl ConfigEngine {
    /// Create an engine on the local filesystem.
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_storage(settings, Arc::new(LocalFs))
    }

    /// Create an engine on a custom storage backend.
    pub fn with_storage(settings: EngineSettings, storage: Arc<dyn Storage>) -> Self {
        let stem = settings
            .config_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("dockerd.json")
            .to_string();
        let backups = BackupStore::new(settings.backup_dir, &stem, storage.clone());

        Self {
            config_path: settings.config_path,
            schema: ConfigSchema::dockerd(),
            backups,
            storage,
            retention: settings.retention,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Load the live document. Never falls back to a default.
    pub fn read(&self) -> EngineResult<ConfigDocument> {
        let bytes = self
            .storage
            .read(&self.config_path)
            .map_err(|e| EngineError::ConfigUnreadable {
                path: self.config_path.clone(),
                reason: e.to_string(),
            })?;
        ConfigDocument::parse(&bytes).map_err(|reason| EngineError::ConfigUnreadable {
            path: self.config_path.clone(),
            reason,
        })
    }

    /// Existence, size and modification time of the live file.
    pub fn file_info(&self) -> FileInfo {
        match self.storage.stat(&self.config_path) {
            Ok(stat) => FileInfo {
                path: self.config_path.clone(),
                exists: true,
                size: stat.size,
                last_modified: stat.modified.map(DateTime::<Local>::from),
            },
            Err(_) => FileInfo {
                path: self.config_path.clone(),
                exists: false,
                size: 0,
                last_modified: None,
            },
        }
    }

    /// Split the live document into editable fields and a read-only summary.
    pub fn preview(&self) -> EngineResult<Preview> {
        let document = self.read()?;

        let editable = self
            .schema
            .fields()
            .iter()
            .map(|spec| EditableField {
                spec: spec.clone(),
                value: self.schema.extract(&document, spec).cloned(),
            })
            .collect();

        let mut protected = Vec::new();
        for (key, value) in document.iter() {
            let class = self.schema.classify(key);
            if class.is_editable() {
                continue;
            }
            let value = match value {
                Value::Object(obj) if self.schema.is_container(key) => {
                    let rest: Map<String, Value> = obj
                        .iter()
                        .filter(|(k, _)| self.schema.field(k).is_none())
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    if rest.is_empty() {
                        continue;
                    }
                    Value::Object(rest)
                }
                other => other.clone(),
            };
            protected.push(ProtectedField {
                key: key.clone(),
                value,
                known: class == FieldClass::Protected,
            });
        }

        Ok(Preview { editable, protected })
    }

    /// Apply `edits` to the editable fields of the live document.
    ///
    /// Protected and unknown keys in `edits` are dropped without error. If any
    /// editable value is invalid nothing is written and no backup is made.
    pub fn update(&self, edits: &Map<String, Value>) -> EngineResult<ConfigDocument> {
        let result = self.commit("update", |current| {
            let mut accepted: Vec<(&FieldSpec, &Value)> = Vec::new();
            for (key, value) in edits {
                match self.schema.classify(key) {
                    FieldClass::Editable(field) => {
                        self.schema.validate(key, value)?;
                        accepted.push((field, value));
                    }
                    class => {
                        tracing::debug!(key = %key, class = ?class, "Ignoring non-editable key");
                    }
                }
            }

            let mut next = current.clone();
            for (field, value) in accepted {
                self.schema.apply(&mut next, field, value)?;
            }
            Ok(next)
        });
        metrics::record_operation("update", &result);
        result
    }

    /// Restore the document held in backup `backup_id`.
    ///
    /// The backup is resolved and validated before the live file is looked
    /// at. The current file is backed up first, so a rollback can itself be
    /// rolled back. A live file that no longer parses is snapshotted byte for
    /// byte and then replaced; a missing one is simply recreated.
    pub fn rollback(&self, backup_id: &str) -> EngineResult<ConfigDocument> {
        let result = self.restore(backup_id);
        metrics::record_operation("rollback", &result);
        result
    }

    fn restore(&self, backup_id: &str) -> EngineResult<ConfigDocument> {
        let _guard = self.lock();

        let restored = self.backups.retrieve(backup_id)?;
        for field in self.schema.fields() {
            if let Some(value) = self.schema.extract(&restored, field) {
                self.schema.validate(field.key, value)?;
            }
        }

        let previous = self.read_live()?;
        self.replace("rollback", &previous, restored)
    }

    /// Snapshot the live document without changing it.
    pub fn backup_now(&self) -> EngineResult<BackupRecord> {
        let _guard = self.lock();
        let result = self.read().and_then(|current| self.backups.snapshot(&current));
        metrics::record_operation("backup", &result);
        if result.is_ok() {
            self.enforce_retention();
        }
        result
    }

    pub fn list_backups(&self) -> EngineResult<Vec<BackupRecord>> {
        self.backups.list()
    }

    pub fn retrieve_backup(&self, backup_id: &str) -> EngineResult<ConfigDocument> {
        self.backups.retrieve(backup_id)
    }

    pub fn read_backup_raw(&self, backup_id: &str) -> EngineResult<String> {
        self.backups.read_raw(backup_id)
    }

    /// Delete one backup. Serialized with writers so it cannot race a snapshot.
    pub fn delete_backup(&self, backup_id: &str) -> EngineResult<()> {
        let _guard = self.lock();
        let result = self.backups.delete(backup_id).map(|_| ());
        metrics::record_operation("delete_backup", &result);
        if result.is_ok() {
            self.record_backup_count();
        }
        result
    }

    /// Edit path: lock, read, plan, then [`Self::replace`].
    fn commit<F>(&self, operation: &'static str, plan: F) -> EngineResult<ConfigDocument>
    where
        F: FnOnce(&ConfigDocument) -> EngineResult<ConfigDocument>,
    {
        let _guard = self.lock();

        let current = self.read()?;
        let next = plan(&current)?;
        self.replace(operation, &LiveState::Parsed(current), next)
    }

    /// Live file as found before a restore.
    fn read_live(&self) -> EngineResult<LiveState> {
        match self.storage.read(&self.config_path) {
            Ok(bytes) => match ConfigDocument::parse(&bytes) {
                Ok(document) => Ok(LiveState::Parsed(document)),
                Err(reason) => {
                    tracing::warn!(
                        path = %self.config_path.display(),
                        reason = %reason,
                        "Live configuration does not parse, keeping its raw bytes"
                    );
                    Ok(LiveState::Raw(bytes))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LiveState::Missing),
            Err(e) => Err(EngineError::ConfigUnreadable {
                path: self.config_path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Back up `previous`, then atomically write `next`. Caller holds the lock.
    fn replace(
        &self,
        operation: &'static str,
        previous: &LiveState,
        next: ConfigDocument,
    ) -> EngineResult<ConfigDocument> {
        let backup = match previous {
            LiveState::Parsed(document) => Some(self.backups.snapshot(document)?),
            LiveState::Raw(bytes) => Some(self.backups.snapshot_raw(bytes)?),
            LiveState::Missing => None,
        };

        if let Err(source) = self
            .storage
            .write_atomic(&self.config_path, &next.to_pretty_bytes())
        {
            tracing::error!(
                operation,
                path = %self.config_path.display(),
                error = %source,
                "Live write failed, discarding its backup"
            );
            if let Some(backup) = &backup {
                if let Err(e) = self.backups.delete(&backup.id.to_string()) {
                    tracing::error!(backup_id = %backup.id, error = %e, "Failed to discard backup");
                }
            }
            return Err(EngineError::WriteFailed {
                path: self.config_path.clone(),
                source,
            });
        }

        let backup_id = backup
            .as_ref()
            .map(|b| b.id.to_string())
            .unwrap_or_else(|| "none".to_string());
        tracing::info!(
            operation,
            backup_id = %backup_id,
            path = %self.config_path.display(),
            "Configuration written"
        );
        self.enforce_retention();
        Ok(next)
    }

    fn enforce_retention(&self) {
        if let Err(e) = self.backups.prune(&self.retention) {
            tracing::warn!(error = %e, "Backup pruning failed");
        }
        self.record_backup_count();
    }

    fn record_backup_count(&self) {
        if let Ok(list) = self.backups.list() {
            metrics::record_backup_count(list.len());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // Guards no data; a poisoned lock is still usable.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
