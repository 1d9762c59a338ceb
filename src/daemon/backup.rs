//! Backup snapshots of the live configuration.
//!
//! # Responsibilities
//! - Mint sortable, timestamp-derived backup identifiers
//! - Persist, list, retrieve and delete snapshots
//! - Apply the retention policy
//!
//! # Layout
//! ```text
//! <backup_dir>/
//!     dockerd.json_20250101_120000        first backup in that second
//!     dockerd.json_20250101_120000_001    second backup in the same second
//!     dockerd.json_20250102_093015
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};

use crate::daemon::document::ConfigDocument;
use crate::daemon::error::{EngineError, EngineResult};
use crate::daemon::storage::Storage;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const STAMP_LEN: usize = 15;

/// Identifier of a backup: creation second plus a same-second sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupId {
    created: NaiveDateTime,
    seq: u32,
}

impl BackupId {
    /// Parse `YYYYMMDD_HHMMSS` or `YYYYMMDD_HHMMSS_NNN`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() < STAMP_LEN || !raw.is_char_boundary(STAMP_LEN) {
            return None;
        }
        let (stamp, rest) = raw.split_at(STAMP_LEN);
        let created = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;

        let seq = match rest.strip_prefix('_') {
            None if rest.is_empty() => 0,
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                digits.parse().ok()?
            }
            _ => return None,
        };
        Some(Self { created, seq })
    }

    /// Next identifier after `latest` for a backup taken at `now`.
    ///
    /// Always strictly greater than `latest`, even if the clock went back.
    pub fn next(now: NaiveDateTime, latest: Option<&BackupId>) -> Self {
        let now = now.with_nanosecond(0).unwrap_or(now);
        match latest {
            Some(l) if l.created >= now => match l.seq.checked_add(1) {
                Some(seq) => Self {
                    created: l.created,
                    seq,
                },
                None => Self {
                    created: l.created + chrono::Duration::seconds(1),
                    seq: 0,
                },
            },
            _ => Self { created: now, seq: 0 },
        }
    }

    pub fn created(&self) -> NaiveDateTime {
        self.created
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.created.format(STAMP_FORMAT))?;
        if self.seq > 0 {
            write!(f, "_{:03}", self.seq)?;
        }
        Ok(())
    }
}

impl Serialize for BackupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Metadata of one backup. The content stays on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub id: BackupId,
    pub file_name: String,
    pub created_at: NaiveDateTime,
    pub size: u64,
}

/// Which backups `prune` may delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep at most this many backups.
    pub max_count: Option<usize>,
    /// Delete backups older than this.
    pub max_age: Option<chrono::Duration>,
}

impl RetentionPolicy {
    pub fn is_unbounded(&self) -> bool {
        self.max_count.is_none() && self.max_age.is_none()
    }
}

/// Directory of backup snapshots. No other component writes there.
#[derive(Clone)]
pub struct BackupStore {
    dir: PathBuf,
    prefix: String,
    storage: Arc<dyn Storage>,
}

impl BackupStore {
    /// Create a store whose files are named `<file_stem>_<id>`.
    pub fn new(dir: impl Into<PathBuf>, file_stem: &str, storage: Arc<dyn Storage>) -> Self {
        Self {
            dir: dir.into(),
            prefix: format!("{}_", file_stem),
            storage,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the backup directory if needed.
    pub fn init(&self) -> EngineResult<()> {
        self.storage
            .ensure_dir(&self.dir)
            .map_err(|source| EngineError::BackupStoreIo {
                path: self.dir.clone(),
                source,
            })
    }

    /// Persist `document` under a newly minted identifier.
    pub fn snapshot(&self, document: &ConfigDocument) -> EngineResult<BackupRecord> {
        self.snapshot_at(document, Local::now().naive_local())
    }

    /// Persist bytes that do not parse as a document, verbatim.
    pub fn snapshot_raw(&self, bytes: &[u8]) -> EngineResult<BackupRecord> {
        self.write_snapshot(bytes, Local::now().naive_local())
    }

    fn snapshot_at(&self, document: &ConfigDocument, now: NaiveDateTime) -> EngineResult<BackupRecord> {
        self.write_snapshot(&document.to_pretty_bytes(), now)
    }

    fn write_snapshot(&self, bytes: &[u8], now: NaiveDateTime) -> EngineResult<BackupRecord> {
        let latest = self
            .list()
            .map_err(|e| match e {
                EngineError::BackupStoreIo { source, .. } => EngineError::BackupWriteFailed {
                    id: "<unassigned>".to_string(),
                    source,
                },
                other => other,
            })?
            .into_iter()
            .next();
        let id = BackupId::next(now, latest.as_ref().map(|r| &r.id));
        let file_name = self.file_name(&id);

        self.storage
            .ensure_dir(&self.dir)
            .and_then(|_| self.storage.write_atomic(&self.dir.join(&file_name), bytes))
            .map_err(|source| EngineError::BackupWriteFailed {
                id: id.to_string(),
                source,
            })?;

        tracing::info!(backup_id = %id, size = bytes.len(), "Backup created");
        Ok(BackupRecord {
            id,
            file_name,
            created_at: id.created(),
            size: bytes.len() as u64,
        })
    }

    /// All backups, newest first.
    pub fn list(&self) -> EngineResult<Vec<BackupRecord>> {
        let entries = self
            .storage
            .list(&self.dir)
            .map_err(|source| EngineError::BackupStoreIo {
                path: self.dir.clone(),
                source,
            })?;

        let mut records: Vec<BackupRecord> = entries
            .into_iter()
            .filter_map(|entry| {
                let id = BackupId::parse(entry.name.strip_prefix(&self.prefix)?)?;
                Some(BackupRecord {
                    id,
                    created_at: id.created(),
                    size: entry.size,
                    file_name: entry.name,
                })
            })
            .collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }

    /// Resolve a user-supplied identifier, with or without the file prefix.
    pub fn resolve(&self, raw: &str) -> EngineResult<BackupId> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix(&self.prefix).unwrap_or(trimmed);
        BackupId::parse(bare).ok_or_else(|| EngineError::BackupNotFound(raw.to_string()))
    }

    /// Load and parse a backup.
    pub fn retrieve(&self, raw: &str) -> EngineResult<ConfigDocument> {
        let (id, bytes) = self.read_bytes(raw)?;
        ConfigDocument::parse(&bytes).map_err(|reason| EngineError::BackupCorrupted {
            id: id.to_string(),
            reason,
        })
    }

    /// Backup content for display: pretty-printed if it parses, raw otherwise.
    pub fn read_raw(&self, raw: &str) -> EngineResult<String> {
        let (_, bytes) = self.read_bytes(raw)?;
        Ok(match ConfigDocument::parse(&bytes) {
            Ok(doc) => String::from_utf8_lossy(&doc.to_pretty_bytes()).into_owned(),
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Remove one backup.
    pub fn delete(&self, raw: &str) -> EngineResult<BackupId> {
        let id = self.resolve(raw)?;
        let path = self.dir.join(self.file_name(&id));
        match self.storage.remove(&path) {
            Ok(()) => {
                tracing::info!(backup_id = %id, "Backup deleted");
                Ok(id)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::BackupNotFound(raw.to_string()))
            }
            Err(source) => Err(EngineError::BackupStoreIo { path, source }),
        }
    }

    /// Delete backups outside `policy`, oldest first. The newest backup is always kept.
    pub fn prune(&self, policy: &RetentionPolicy) -> EngineResult<Vec<BackupId>> {
        self.prune_at(policy, Local::now().naive_local())
    }

    fn prune_at(&self, policy: &RetentionPolicy, now: NaiveDateTime) -> EngineResult<Vec<BackupId>> {
        if policy.is_unbounded() {
            return Ok(Vec::new());
        }

        let records = self.list()?;
        let doomed: Vec<&BackupRecord> = records
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(i, rec)| {
                let over_count = policy.max_count.is_some_and(|max| *i >= max);
                let too_old = policy.max_age.is_some_and(|age| now - rec.created_at > age);
                over_count || too_old
            })
            .map(|(_, rec)| rec)
            .collect();

        let mut deleted = Vec::with_capacity(doomed.len());
        for rec in doomed.into_iter().rev() {
            let path = self.dir.join(&rec.file_name);
            self.storage
                .remove(&path)
                .map_err(|source| EngineError::BackupStoreIo { path, source })?;
            deleted.push(rec.id);
        }

        if !deleted.is_empty() {
            tracing::info!(count = deleted.len(), "Pruned old backups");
        }
        Ok(deleted)
    }

    fn read_bytes(&self, raw: &str) -> EngineResult<(BackupId, Vec<u8>)> {
        let id = self.resolve(raw)?;
        match self.storage.read(&self.dir.join(self.file_name(&id))) {
            Ok(bytes) => Ok((id, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::BackupNotFound(raw.to_string()))
            }
            Err(e) => Err(EngineError::BackupCorrupted {
                id: id.to_string(),
                reason: format!("unreadable: {}", e),
            }),
        }
    }

    fn file_name(&self, id: &BackupId) -> String {
        format!("{}{}", self.prefix, id)
    }
}
