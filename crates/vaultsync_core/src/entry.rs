//! Vault records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Well-known field names.
pub mod fields {
    /// Entry title.
    pub const TITLE: &str = "Title";
    /// Account user name.
    pub const USER_NAME: &str = "UserName";
    /// Account password.
    pub const PASSWORD: &str = "Password";
    /// Associated URL.
    pub const URL: &str = "URL";
    /// Free-form notes.
    pub const NOTES: &str = "Notes";
}

/// Returns the current time as milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A single record in a vault.
///
/// Entries are compared by `modified_at` during synchronization, so every
/// user-visible change must go through [`Entry::touch`] (or a method that
/// calls it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    uuid: Uuid,
    fields: BTreeMap<String, String>,
    created_at: u64,
    modified_at: u64,
}

impl Entry {
    /// Creates an empty entry with a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_uuid(Uuid::new_v4())
    }

    /// Creates an empty entry with the given id.
    #[must_use]
    pub fn with_uuid(uuid: Uuid) -> Self {
        let now = now_millis();
        Self {
            uuid,
            fields: BTreeMap::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Returns the entry id.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Replaces the entry id.
    ///
    /// Used when a record is re-keyed (for example a settings record found
    /// under a legacy id).
    pub fn set_uuid(&mut self, uuid: Uuid) {
        self.uuid = uuid;
    }

    /// Returns a field value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Sets a field value without changing the modification time.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a field, returning its previous value.
    pub fn remove_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    /// Iterates over all fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Creation time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Last modification time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn modified_at(&self) -> u64 {
        self.modified_at
    }

    /// Marks the entry as modified now.
    ///
    /// The timestamp never moves backwards, even if the clock does.
    pub fn touch(&mut self) {
        self.modified_at = now_millis().max(self.modified_at + 1);
    }

    /// Sets the modification time explicitly.
    pub fn set_modified_at(&mut self, millis: u64) {
        self.modified_at = millis;
    }

    /// Title shortcut.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.field(fields::TITLE)
    }
}

impl Default for Entry {
    fn default() -> Self {
        Self::new()
    }
}

/// Record of a deleted entry, kept so deletions propagate on merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedObject {
    /// Id of the deleted entry.
    pub uuid: Uuid,
    /// Deletion time in milliseconds since the Unix epoch.
    pub deleted_at: u64,
}
