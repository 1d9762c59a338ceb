//! Filesystem access used by the engine and the backup store.
//!
//! # Design Decisions
//! - Whole-file reads and writes only; documents are small
//! - `write_atomic` writes a temp file in the target's directory, syncs it
//!   and renames it over the target, so readers see the old or the new file
//! - The trait is the seam for failure injection in tests

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A directory entry as seen by [`Storage::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub size: u64,
}

/// File metadata as seen by [`Storage::stat`].
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Minimal blob-store view of the filesystem.
pub trait Storage: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace `path` with `contents` so that no reader observes a partial file.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// List regular files in `dir`. A missing directory lists as empty.
    fn list(&self, dir: &Path) -> io::Result<Vec<Entry>>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    fn ensure_dir(&self, dir: &Path) -> io::Result<()>;
}

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    fn temp_path(path: &Path) -> io::Result<PathBuf> {
        let file_name = path.file_name().and_then(|s| s.to_str()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file path for atomic write: {}", path.display()),
            )
        })?;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Ok(path.with_file_name(format!(
            ".{}.tmp.{}.{}",
            file_name,
            std::process::id(),
            nanos
        )))
    }
}

impl Storage for LocalFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let tmp = Self::temp_path(path)?;

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents)?;
            file.sync_all()?;
            // Keep the mode of the file being replaced (dockerd.json is root-owned 0644 on DSM).
            if let Ok(meta) = fs::metadata(path) {
                fs::set_permissions(&tmp, meta.permissions())?;
            }
            fs::rename(&tmp, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<Entry>> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                entries.push(Entry {
                    name: name.to_string(),
                    size: meta.len(),
                });
            }
        }
        Ok(entries)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = fs::metadata(path)?;
        Ok(FileStat {
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }
}
