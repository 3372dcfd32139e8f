//! [`LocalDatabase`] and [`SettingsStore`] over the VaultSync vault.

use crate::database::{DatabaseError, LocalDatabase, MergePolicy};
use crate::settings::SettingsStore;
use std::path::Path;
use tracing::debug;
use vaultsync_core::{CoreError, Entry, MasterKey, MergeMethod, Vault};

impl From<CoreError> for DatabaseError {
    fn from(e: CoreError) -> Self {
        if e.is_integrity_failure() {
            return DatabaseError::Integrity(e.to_string());
        }
        match e {
            CoreError::Io(io) => DatabaseError::Io(io),
            other => DatabaseError::Other(other.to_string()),
        }
    }
}

impl From<MergePolicy> for MergeMethod {
    fn from(policy: MergePolicy) -> Self {
        match policy {
            MergePolicy::KeepExisting => MergeMethod::KeepExisting,
            MergePolicy::OverwriteIfNewer => MergeMethod::OverwriteIfNewer,
            MergePolicy::Synchronize => MergeMethod::Synchronize,
        }
    }
}

impl LocalDatabase for Vault {
    type Key = MasterKey;

    fn open(path: &Path, key: &MasterKey) -> Result<Self, DatabaseError> {
        Ok(Vault::open(path, key)?)
    }

    fn io_path(&self) -> &Path {
        self.path()
    }

    fn master_key(&self) -> &MasterKey {
        Vault::master_key(self)
    }

    fn save(&mut self) -> Result<(), DatabaseError> {
        Ok(Vault::save(self)?)
    }

    fn save_as(&self, path: &Path) -> Result<(), DatabaseError> {
        Ok(self.save_copy(path)?)
    }

    fn merge_in(&mut self, other: &Self, policy: MergePolicy) -> Result<(), DatabaseError> {
        let stats = Vault::merge_in(self, other, policy.into());
        debug!(
            added = stats.added,
            updated = stats.updated,
            deleted = stats.deleted,
            "merged remote copy"
        );
        Ok(())
    }

    fn close(self) {
        Vault::close(self);
    }
}

impl SettingsStore for Entry {
    fn get(&self, key: &str) -> Option<String> {
        self.field(key).map(str::to_string)
    }

    fn set(&mut self, key: &str, value: &str) {
        if self.field(key) != Some(value) {
            self.set_field(key, value);
            self.touch();
        }
    }
}
