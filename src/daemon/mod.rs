//! Safe mutation engine for the container daemon's `dockerd.json`.
//!
//! # Data Flow
//! ```text
//! edits (key -> JSON value)
//!     → schema.rs (classify: editable / protected / passthrough, validate)
//!     → engine.rs (merge into the live document, under the write lock)
//!     → backup.rs (snapshot of the pre-write document)
//!     → storage.rs (temp file + rename into place)
//!
//! rollback(id)
//!     → backup.rs (retrieve snapshot)
//!     → schema.rs (re-validate editable fields)
//!     → backup.rs (snapshot of the current document)
//!     → storage.rs (atomic replace)
//! ```
//!
//! # Invariants
//! - Every write is preceded by a successful backup of the state it replaces
//! - A failed operation leaves the live file and the backup set untouched
//! - Protected and unknown keys are carried forward verbatim
//! - Writers are serialized; readers rely on atomic rename only

pub mod backup;
pub mod document;
pub mod engine;
pub mod error;
pub mod schema;
pub mod storage;

pub use backup::{BackupId, BackupRecord, BackupStore, RetentionPolicy};
pub use document::ConfigDocument;
pub use engine::{ConfigEngine, EngineSettings, FileInfo, Preview};
pub use error::{EngineError, EngineResult};
pub use schema::{ConfigSchema, FieldClass, FieldSpec};
pub use storage::{LocalFs, Storage};
