//! The local database seen by the engine.

use std::io;
use std::path::Path;
use thiserror::Error;

/// How an incoming copy is merged into the local database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Only add records the local copy lacks.
    KeepExisting,
    /// Add missing records and replace older ones.
    OverwriteIfNewer,
    /// Two-way reconciliation including deletions.
    Synchronize,
}

/// Errors raised by a [`LocalDatabase`].
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The file could not be decrypted or is not a valid container.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Returns true if the file failed decryption or container checks.
    ///
    /// The engine treats such a remote copy as corrupted rather than as a
    /// merge failure.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, DatabaseError::Integrity(_))
    }
}

/// An open, file-backed database the engine can snapshot and merge into.
pub trait LocalDatabase: Sized {
    /// Secret needed to open a copy of this database.
    type Key;

    /// Opens the database file at `path`.
    fn open(path: &Path, key: &Self::Key) -> Result<Self, DatabaseError>;

    /// Backing file path. Its file name names the remote artifact.
    fn io_path(&self) -> &Path;

    /// Key this database was opened with.
    fn master_key(&self) -> &Self::Key;

    /// Saves to the backing file.
    fn save(&mut self) -> Result<(), DatabaseError>;

    /// Writes the current in-memory state to `path` without rebinding.
    fn save_as(&self, path: &Path) -> Result<(), DatabaseError>;

    /// Merges `other` into this database.
    fn merge_in(&mut self, other: &Self, policy: MergePolicy) -> Result<(), DatabaseError>;

    /// Closes the database.
    fn close(self);
}
