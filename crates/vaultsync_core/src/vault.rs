//! The vault: an encrypted, record-oriented database file.

use crate::crypto::{KdfParams, MasterKey};
use crate::entry::{now_millis, DeletedObject, Entry};
use crate::error::{CoreError, CoreResult};
use crate::format;
use crate::merge::{self, MergeMethod, MergeStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Serialized form of the decrypted vault body.
#[derive(Serialize, Deserialize)]
struct VaultBody {
    name: String,
    name_changed_at: u64,
    entries: Vec<Entry>,
    deleted: Vec<DeletedObject>,
}

/// An open vault.
///
/// A vault is bound to a backing file (`path`) and the master key it was
/// opened with. All edits happen in memory; [`save`](Self::save) writes the
/// whole vault back atomically.
pub struct Vault {
    path: PathBuf,
    master_key: MasterKey,
    kdf: KdfParams,
    pub(crate) name: String,
    pub(crate) name_changed_at: u64,
    pub(crate) entries: BTreeMap<Uuid, Entry>,
    pub(crate) deleted: BTreeMap<Uuid, u64>,
    pub(crate) modified: bool,
}

impl Vault {
    /// Creates an empty, unsaved vault bound to `path`.
    pub fn new(path: impl Into<PathBuf>, master_key: MasterKey, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            master_key,
            kdf: KdfParams::default(),
            name: name.into(),
            name_changed_at: now_millis(),
            entries: BTreeMap::new(),
            deleted: BTreeMap::new(),
            modified: true,
        }
    }

    /// Creates an empty vault and writes it to `path`.
    pub fn create(
        path: impl Into<PathBuf>,
        master_key: MasterKey,
        name: impl Into<String>,
    ) -> CoreResult<Self> {
        let mut vault = Self::new(path, master_key, name);
        vault.save()?;
        info!(path = %vault.path.display(), "created vault");
        Ok(vault)
    }

    /// Opens the vault stored at `path`.
    ///
    /// # Errors
    ///
    /// Integrity failures (wrong key, damaged container) are reported as
    /// [`CoreError::DecryptionFailed`] or [`CoreError::InvalidFormat`]; see
    /// [`CoreError::is_integrity_failure`].
    pub fn open(path: impl AsRef<Path>, master_key: &MasterKey) -> CoreResult<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let (plaintext, kdf) = format::open(&data, master_key)?;

        let body: VaultBody = ciborium::from_reader(plaintext.as_slice())
            .map_err(|e| CoreError::codec(e.to_string()))?;

        debug!(
            path = %path.display(),
            entries = body.entries.len(),
            "opened vault"
        );

        Ok(Self {
            path: path.to_path_buf(),
            master_key: master_key.clone(),
            kdf,
            name: body.name,
            name_changed_at: body.name_changed_at,
            entries: body.entries.into_iter().map(|e| (e.uuid(), e)).collect(),
            deleted: body
                .deleted
                .into_iter()
                .map(|d| (d.uuid, d.deleted_at))
                .collect(),
            modified: false,
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the master key the vault was opened with.
    #[must_use]
    pub fn master_key(&self) -> &MasterKey {
        &self.master_key
    }

    /// Replaces the master key. Takes effect on the next save.
    pub fn set_master_key(&mut self, master_key: MasterKey) {
        self.master_key = master_key;
        self.modified = true;
    }

    /// Returns the key stretching cost used on save.
    #[must_use]
    pub fn kdf_params(&self) -> KdfParams {
        self.kdf
    }

    /// Replaces the key stretching cost. Takes effect on the next save.
    pub fn set_kdf_params(&mut self, kdf: KdfParams) {
        if self.kdf != kdf {
            self.kdf = kdf;
            self.modified = true;
        }
    }

    /// Returns the vault's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the vault.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.name_changed_at = now_millis();
        self.modified = true;
    }

    /// Returns true if there are unsaved changes.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the vault has no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over live entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Looks up an entry.
    #[must_use]
    pub fn entry(&self, uuid: &Uuid) -> Option<&Entry> {
        self.entries.get(uuid)
    }

    /// Looks up an entry for editing. Marks the vault modified.
    pub fn entry_mut(&mut self, uuid: &Uuid) -> Option<&mut Entry> {
        let entry = self.entries.get_mut(uuid)?;
        self.modified = true;
        Some(entry)
    }

    /// Inserts or replaces an entry.
    pub fn put_entry(&mut self, entry: Entry) {
        self.deleted.remove(&entry.uuid());
        self.entries.insert(entry.uuid(), entry);
        self.modified = true;
    }

    /// Removes an entry and records its deletion.
    pub fn remove_entry(&mut self, uuid: &Uuid) -> CoreResult<Entry> {
        let entry = self
            .entries
            .remove(uuid)
            .ok_or(CoreError::EntryNotFound { uuid: *uuid })?;
        self.deleted.insert(*uuid, now_millis().max(entry.modified_at()));
        self.modified = true;
        Ok(entry)
    }

    /// Re-keys an entry, dropping the old id without leaving a tombstone.
    pub fn rekey_entry(&mut self, old: &Uuid, new: Uuid) -> CoreResult<()> {
        let mut entry = self
            .entries
            .remove(old)
            .ok_or(CoreError::EntryNotFound { uuid: *old })?;
        entry.set_uuid(new);
        entry.touch();
        self.put_entry(entry);
        Ok(())
    }

    /// Iterates over recorded deletions.
    pub fn deleted_objects(&self) -> impl Iterator<Item = DeletedObject> + '_ {
        self.deleted.iter().map(|(&uuid, &deleted_at)| DeletedObject { uuid, deleted_at })
    }

    /// Writes the vault to its backing file.
    ///
    /// The file is replaced atomically: a crash leaves either the old or
    /// the new version, never a mix.
    pub fn save(&mut self) -> CoreResult<()> {
        let image = self.seal()?;
        write_atomic(&self.path, &image)?;
        self.modified = false;
        debug!(path = %self.path.display(), bytes = image.len(), "saved vault");
        Ok(())
    }

    /// Writes a copy of the vault to `path`.
    ///
    /// The vault stays bound to its original backing file and keeps its
    /// modified flag.
    pub fn save_copy(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        let image = self.seal()?;
        write_atomic(path, &image)?;
        debug!(path = %path.display(), bytes = image.len(), "saved vault copy");
        Ok(())
    }

    /// Merges `other` into this vault.
    pub fn merge_in(&mut self, other: &Vault, method: MergeMethod) -> MergeStats {
        merge::merge(self, other, method)
    }

    /// Closes the vault, discarding unsaved changes.
    pub fn close(self) {
        debug!(path = %self.path.display(), "closed vault");
    }

    fn seal(&self) -> CoreResult<Vec<u8>> {
        let body = VaultBody {
            name: self.name.clone(),
            name_changed_at: self.name_changed_at,
            entries: self.entries.values().cloned().collect(),
            deleted: self.deleted_objects().collect(),
        };

        let mut plaintext = Vec::new();
        ciborium::into_writer(&body, &mut plaintext)
            .map_err(|e| CoreError::codec(e.to_string()))?;

        format::seal(&plaintext, &self.master_key, &self.kdf)
    }

    #[cfg(test)]
    pub(crate) fn clone_as(&self, path: impl Into<PathBuf>) -> Vault {
        Vault {
            path: path.into(),
            master_key: self.master_key.clone(),
            kdf: self.kdf,
            name: self.name.clone(),
            name_changed_at: self.name_changed_at,
            entries: self.entries.clone(),
            deleted: self.deleted.clone(),
            modified: self.modified,
        }
    }

    #[cfg(test)]
    pub(crate) fn mark_saved(&mut self) {
        self.modified = false;
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("modified", &self.modified)
            .finish()
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> CoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| CoreError::Io(e.error))?;
    Ok(())
}
