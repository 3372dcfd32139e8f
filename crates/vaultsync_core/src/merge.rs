//! Merging one vault into another.

use crate::vault::Vault;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// How entries of an incoming vault are combined with the target vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMethod {
    /// Only add entries the target does not have; never overwrite.
    KeepExisting,
    /// Add missing entries and replace entries that are newer in the source.
    /// Deletions are not propagated.
    OverwriteIfNewer,
    /// Full two-way reconciliation: newer edit wins per entry, and
    /// deletions recorded on either side propagate unless the entry was
    /// edited after it was deleted.
    #[default]
    Synchronize,
}

/// Counts of what a merge changed in the target vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries copied from the source that the target did not have.
    pub added: usize,
    /// Target entries replaced by a newer source version.
    pub updated: usize,
    /// Target entries removed because of a source deletion.
    pub deleted: usize,
}

impl MergeStats {
    /// Returns true if the merge changed no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Merges `source` into `target` and returns what changed.
pub(crate) fn merge(target: &mut Vault, source: &Vault, method: MergeMethod) -> MergeStats {
    let mut stats = MergeStats::default();
    let mut metadata_changed = false;

    let tombstones: BTreeMap<Uuid, u64> = if method == MergeMethod::Synchronize {
        let mut merged = target.deleted.clone();
        for (uuid, &at) in &source.deleted {
            let slot = merged.entry(*uuid).or_insert(at);
            if at > *slot {
                *slot = at;
            }
        }
        merged
    } else {
        target.deleted.clone()
    };

    for (uuid, incoming) in &source.entries {
        match target.entries.get(uuid) {
            None => {
                let deleted_later = tombstones
                    .get(uuid)
                    .is_some_and(|&at| at >= incoming.modified_at());
                if !deleted_later {
                    target.entries.insert(*uuid, incoming.clone());
                    stats.added += 1;
                }
            }
            Some(existing) => {
                let newer = incoming.modified_at() > existing.modified_at();
                if newer && method != MergeMethod::KeepExisting {
                    target.entries.insert(*uuid, incoming.clone());
                    stats.updated += 1;
                }
            }
        }
    }

    if method == MergeMethod::Synchronize {
        let mut kept = BTreeMap::new();
        for (uuid, at) in tombstones {
            match target.entries.get(&uuid) {
                Some(entry) if entry.modified_at() > at => {
                    // Edited after deletion: the entry survives, the tombstone goes.
                    metadata_changed = true;
                }
                Some(_) => {
                    target.entries.remove(&uuid);
                    stats.deleted += 1;
                    kept.insert(uuid, at);
                }
                None => {
                    kept.insert(uuid, at);
                }
            }
        }
        if kept != target.deleted {
            metadata_changed = true;
            target.deleted = kept;
        }

        if source.name_changed_at > target.name_changed_at {
            target.name = source.name.clone();
            target.name_changed_at = source.name_changed_at;
            metadata_changed = true;
        }
    }

    if !stats.is_empty() || metadata_changed {
        target.modified = true;
    }

    debug!(
        added = stats.added,
        updated = stats.updated,
        deleted = stats.deleted,
        ?method,
        "merged vault"
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MasterKey;
    use crate::entry::Entry;

    fn vault(name: &str) -> Vault {
        Vault::new(
            format!("/tmp/{name}.vsdb"),
            MasterKey::from_password("pw"),
            name,
        )
    }

    fn entry_at(uuid: Uuid, title: &str, modified_at: u64) -> Entry {
        let mut entry = Entry::with_uuid(uuid);
        entry.set_field("Title", title);
        entry.set_modified_at(modified_at);
        entry
    }

    #[test]
    fn adds_missing_entries() {
        let mut local = vault("local");
        let mut remote = vault("remote");
        let id = Uuid::new_v4();
        remote.put_entry(entry_at(id, "remote only", 10));

        let stats = local.merge_in(&remote, MergeMethod::Synchronize);
        assert_eq!(stats.added, 1);
        assert_eq!(local.entry(&id).unwrap().title(), Some("remote only"));
    }

    #[test]
    fn newer_edit_wins() {
        let id = Uuid::new_v4();
        let mut local = vault("local");
        let mut remote = vault("remote");
        local.put_entry(entry_at(id, "old", 10));
        remote.put_entry(entry_at(id, "new", 20));

        let stats = local.merge_in(&remote, MergeMethod::Synchronize);
        assert_eq!(stats.updated, 1);
        assert_eq!(local.entry(&id).unwrap().title(), Some("new"));

        // The reverse direction keeps the newer local copy.
        let mut stale = vault("stale");
        stale.put_entry(entry_at(id, "older", 5));
        let stats = local.merge_in(&stale, MergeMethod::Synchronize);
        assert!(stats.is_empty());
        assert_eq!(local.entry(&id).unwrap().title(), Some("new"));
    }

    #[test]
    fn keep_existing_never_overwrites() {
        let id = Uuid::new_v4();
        let mut local = vault("local");
        let mut remote = vault("remote");
        local.put_entry(entry_at(id, "mine", 10));
        remote.put_entry(entry_at(id, "theirs", 20));

        let stats = local.merge_in(&remote, MergeMethod::KeepExisting);
        assert!(stats.is_empty());
        assert_eq!(local.entry(&id).unwrap().title(), Some("mine"));
    }

    #[test]
    fn remote_deletion_propagates() {
        let id = Uuid::new_v4();
        let mut local = vault("local");
        let mut remote = vault("remote");
        local.put_entry(entry_at(id, "doomed", 10));
        remote.put_entry(entry_at(id, "doomed", 10));
        remote.remove_entry(&id).unwrap();

        let stats = local.merge_in(&remote, MergeMethod::Synchronize);
        assert_eq!(stats.deleted, 1);
        assert!(local.entry(&id).is_none());
        assert!(local.deleted_objects().any(|d| d.uuid == id));
    }

    #[test]
    fn local_deletion_is_not_resurrected() {
        let id = Uuid::new_v4();
        let mut local = vault("local");
        let mut remote = vault("remote");
        local.put_entry(entry_at(id, "gone", 10));
        remote.put_entry(entry_at(id, "gone", 10));
        local.remove_entry(&id).unwrap();

        let stats = local.merge_in(&remote, MergeMethod::Synchronize);
        assert_eq!(stats.added, 0);
        assert!(local.entry(&id).is_none());
    }

    #[test]
    fn edit_after_deletion_survives() {
        let id = Uuid::new_v4();
        let mut local = vault("local");
        let mut remote = vault("remote");
        local.put_entry(entry_at(id, "x", 10));
        local.remove_entry(&id).unwrap();

        remote.put_entry(entry_at(id, "edited later", u64::MAX / 2));

        let stats = local.merge_in(&remote, MergeMethod::Synchronize);
        assert_eq!(stats.added, 1);
        assert_eq!(local.entry(&id).unwrap().title(), Some("edited later"));
        assert!(!local.deleted_objects().any(|d| d.uuid == id));
    }

    #[test]
    fn identical_vaults_merge_to_nothing() {
        let id = Uuid::new_v4();
        let mut local = vault("local");
        local.put_entry(entry_at(id, "same", 10));
        let remote = local.clone_as("/tmp/copy.vsdb");
        local.mark_saved();

        let stats = local.merge_in(&remote, MergeMethod::Synchronize);
        assert!(stats.is_empty());
        assert!(!local.is_modified());
    }
}
