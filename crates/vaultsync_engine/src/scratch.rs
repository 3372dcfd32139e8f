//! Scratch files used as transfer buffers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Hands out fresh local file paths.
///
/// The caller owns the returned path; the broker never deletes it.
pub trait TempFileBroker: Send + Sync {
    /// Allocates a new, unused path.
    fn allocate(&self) -> io::Result<PathBuf>;
}

const SCRATCH_PREFIX: &str = ".vaultsync-";

/// Allocates scratch files inside one directory.
#[derive(Debug, Clone)]
pub struct TempDirBroker {
    dir: PathBuf,
}

impl TempDirBroker {
    /// Creates a broker for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TempFileBroker for TempDirBroker {
    fn allocate(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        file.into_temp_path().keep().map_err(|e| e.error)
    }
}

/// A scratch path owned by one attempt. Deleted on drop.
#[derive(Debug)]
pub(crate) struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub(crate) fn allocate(broker: &dyn TempFileBroker) -> io::Result<Self> {
        Ok(Self {
            path: broker.allocate()?,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file. Deleting an absent file is not an error.
    pub(crate) fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!(path = %self.path.display(), error = %e, "failed to delete scratch file");
        }
    }
}
