//! Opening a vault for one command.
//!
//! Every command that touches a vault holds an exclusive advisory lock on
//! `<vault>.lock` so two processes never sync or edit the same file at once.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use vaultsync_core::{CoreError, MasterKey, Vault};

/// Errors raised while opening a vault.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No master password was given.
    #[error("master password required (--master-password or VAULTSYNC_MASTER_PASSWORD)")]
    MissingPassword,

    /// Another process holds the vault lock.
    #[error("vault is locked by another process: {0}")]
    Locked(PathBuf),

    /// The vault file already exists.
    #[error("vault already exists: {0}")]
    AlreadyExists(PathBuf),

    /// The vault could not be read or written.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error on the lock file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Master password from the command line or the environment.
pub fn master_password(given: Option<&str>) -> Result<String, SessionError> {
    match given {
        Some(password) if !password.is_empty() => Ok(password.to_string()),
        _ => Err(SessionError::MissingPassword),
    }
}

/// Exclusive lock on a vault, released on drop.
#[derive(Debug)]
pub struct VaultLock {
    path: PathBuf,
    _lock_file: File,
}

impl VaultLock {
    /// Takes the lock for `vault_path` without blocking.
    pub fn acquire(vault_path: &Path) -> Result<Self, SessionError> {
        let path = lock_path(vault_path);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(SessionError::Locked(path));
        }

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Path of the lock file.
    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `<vault>.lock`.
fn lock_path(vault_path: &Path) -> PathBuf {
    let mut name = vault_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// A locked, open vault.
pub struct Session {
    /// The open vault.
    pub vault: Vault,
    _lock: VaultLock,
}

impl Session {
    /// Locks and opens the vault at `path`.
    pub fn open(path: &Path, master_password: &str) -> Result<Self, SessionError> {
        let lock = VaultLock::acquire(path)?;
        let vault = Vault::open(path, &MasterKey::from_password(master_password))?;
        Ok(Self { vault, _lock: lock })
    }

    /// Locks `path` and creates a new vault there.
    pub fn create(path: &Path, master_password: &str, name: &str) -> Result<Self, SessionError> {
        if path.exists() {
            return Err(SessionError::AlreadyExists(path.to_path_buf()));
        }
        let lock = VaultLock::acquire(path)?;
        let vault = Vault::create(path, MasterKey::from_password(master_password), name)?;
        Ok(Self { vault, _lock: lock })
    }

    /// Saves the vault if it has unsaved changes.
    pub fn save_if_modified(&mut self) -> Result<bool, SessionError> {
        if !self.vault.is_modified() {
            return Ok(false);
        }
        self.vault.save()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_lock_fails() {
        let dir = TempDir::new().unwrap();
        let vault = dir.path().join("v.kdbx");
        let first = VaultLock::acquire(&vault).unwrap();
        assert_eq!(first.path(), dir.path().join("v.kdbx.lock"));
        assert!(matches!(
            VaultLock::acquire(&vault),
            Err(SessionError::Locked(_))
        ));
        drop(first);
        assert!(VaultLock::acquire(&vault).is_ok());
    }

    #[test]
    fn create_then_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.kdbx");
        drop(Session::create(&path, "pw", "v").unwrap());
        assert!(matches!(
            Session::create(&path, "pw", "v"),
            Err(SessionError::AlreadyExists(_))
        ));

        let mut session = Session::open(&path, "pw").unwrap();
        assert!(!session.save_if_modified().unwrap());
        drop(session);
        assert!(matches!(
            Session::open(&path, "wrong"),
            Err(SessionError::Core(_))
        ));
    }

    #[test]
    fn empty_password_is_missing() {
        assert!(matches!(
            master_password(Some("")),
            Err(SessionError::MissingPassword)
        ));
        assert_eq!(master_password(Some("x")).unwrap(), "x");
    }
}
