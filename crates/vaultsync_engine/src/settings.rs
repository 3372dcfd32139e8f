//! Sync settings stored inside the vault.
//!
//! The settings live in a dedicated entry whose id is derived from the
//! application name, so every device finds the same entry and the settings
//! travel with the vault.

use crate::config::{Credentials, SyncContext};
use tracing::{debug, info};
use uuid::Uuid;
use vaultsync_core::{fields, Entry, Vault};

/// Application name the options entry id is derived from.
pub const APP_NAME: &str = "VaultSync";

/// Name used by releases that stored settings under another id.
pub const LEGACY_APP_NAME: &str = "VaultSync.Sftp";

/// Field holding the sync-on-open flag.
pub const FIELD_SYNC_ON_OPEN: &str = "OptionSyncOnOpen";
/// Field holding the sync-on-save flag.
pub const FIELD_SYNC_ON_SAVE: &str = "OptionSyncOnSave";
/// Field holding the auto-sync interval in minutes.
pub const FIELD_TIMER_MINUTES: &str = "OptionTimerTimeSpanValue";

/// URL written into a new options entry. Deliberately not a valid target.
pub const DEFAULT_URL: &str = "sftp://host:port/path/to/directory/";
/// Placeholder user name.
pub const DEFAULT_USERNAME: &str = "sshUsername";
/// Placeholder password.
pub const DEFAULT_PASSWORD: &str = "sshPassword";

const DEFAULT_NOTES: &str = "This entry holds the synchronization settings. \
Edit it freely but keep its id.\n\nOnly the SFTP protocol is supported.";

/// Key/value access to a settings record.
pub trait SettingsStore {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value.
    fn set(&mut self, key: &str, value: &str);

    /// Returns true if `key` has a value.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Id of the options entry for `app_name`.
///
/// The first 16 bytes of the UTF-16LE encoding of `"<app_name>.Options"`,
/// zero-padded if shorter.
pub fn options_entry_uuid(app_name: &str) -> Uuid {
    let mut bytes = [0u8; 16];
    let name = format!("{app_name}.Options");
    let encoded = name
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .take(16);
    for (slot, byte) in bytes.iter_mut().zip(encoded) {
        *slot = byte;
    }
    Uuid::from_bytes(bytes)
}

/// Sync options as read from the options entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Target URL.
    pub url: String,
    /// Remote user name.
    pub username: String,
    /// Remote password.
    pub password: String,
    /// Sync right after the vault is opened.
    pub sync_on_open: bool,
    /// Sync after every save.
    pub sync_on_save: bool,
    /// Auto-sync interval in minutes; 0 disables it.
    pub interval_minutes: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            sync_on_open: false,
            sync_on_save: false,
            interval_minutes: 0,
        }
    }
}

impl SyncSettings {
    /// Reads settings, writing defaults for missing option fields.
    ///
    /// Booleans parse case-insensitively; anything else reads as false.
    /// Intervals that do not parse read as 0 and negative ones clamp to 0.
    pub fn load(store: &mut impl SettingsStore) -> Self {
        let defaults = Self::default();
        for (key, value) in [
            (FIELD_TIMER_MINUTES, defaults.interval_minutes.to_string()),
            (FIELD_SYNC_ON_OPEN, format_bool(defaults.sync_on_open).to_string()),
            (FIELD_SYNC_ON_SAVE, format_bool(defaults.sync_on_save).to_string()),
        ] {
            if !store.contains(key) {
                store.set(key, &value);
            }
        }

        Self {
            url: store.get(fields::URL).unwrap_or_default(),
            username: store.get(fields::USER_NAME).unwrap_or_default(),
            password: store.get(fields::PASSWORD).unwrap_or_default(),
            sync_on_open: parse_bool(store.get(FIELD_SYNC_ON_OPEN).as_deref()),
            sync_on_save: parse_bool(store.get(FIELD_SYNC_ON_SAVE).as_deref()),
            interval_minutes: parse_minutes(store.get(FIELD_TIMER_MINUTES).as_deref()),
        }
    }

    /// Writes every field.
    pub fn store(&self, store: &mut impl SettingsStore) {
        store.set(fields::URL, &self.url);
        store.set(fields::USER_NAME, &self.username);
        store.set(fields::PASSWORD, &self.password);
        store.set(FIELD_SYNC_ON_OPEN, format_bool(self.sync_on_open));
        store.set(FIELD_SYNC_ON_SAVE, format_bool(self.sync_on_save));
        store.set(FIELD_TIMER_MINUTES, &self.interval_minutes.to_string());
    }

    /// Remote login.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Context for one attempt.
    pub fn context(&self, attended: bool) -> SyncContext {
        SyncContext {
            attended,
            url: self.url.clone(),
            credentials: self.credentials(),
        }
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn parse_bool(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn parse_minutes(value: Option<&str>) -> u32 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|m| m.clamp(0, i64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

/// How the options entry was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsSource {
    /// Found under the current id.
    Existing,
    /// Found under the legacy id and moved.
    Migrated,
    /// Not found; created with defaults.
    Created,
}

/// Finds the options entry, migrating or creating it as needed.
pub fn ensure_options_entry(vault: &mut Vault) -> OptionsSource {
    let current = options_entry_uuid(APP_NAME);
    if vault.entry(&current).is_some() {
        return OptionsSource::Existing;
    }

    let legacy = options_entry_uuid(LEGACY_APP_NAME);
    if vault.entry(&legacy).is_some() && vault.rekey_entry(&legacy, current).is_ok() {
        if let Some(entry) = vault.entry_mut(&current) {
            entry.set_field(fields::TITLE, APP_NAME);
        }
        info!(from = %legacy, to = %current, "migrated options entry");
        return OptionsSource::Migrated;
    }

    let mut entry = Entry::with_uuid(current);
    entry.set_field(fields::TITLE, APP_NAME);
    entry.set_field(fields::NOTES, DEFAULT_NOTES);
    SyncSettings::default().store(&mut entry);
    vault.put_entry(entry);
    debug!(uuid = %current, "created options entry");
    OptionsSource::Created
}

/// Loads the settings, creating the options entry if needed.
pub fn load_settings(vault: &mut Vault) -> (SyncSettings, OptionsSource) {
    let source = ensure_options_entry(vault);
    let uuid = options_entry_uuid(APP_NAME);
    let settings = match vault.entry(&uuid) {
        Some(entry) => {
            let mut filled = entry.clone();
            let settings = SyncSettings::load(&mut filled);
            if &filled != entry {
                vault.put_entry(filled);
            }
            settings
        }
        None => SyncSettings::default(),
    };
    (settings, source)
}

/// Writes the settings into the options entry.
pub fn save_settings(vault: &mut Vault, settings: &SyncSettings) {
    ensure_options_entry(vault);
    let uuid = options_entry_uuid(APP_NAME);
    if let Some(entry) = vault.entry(&uuid) {
        let mut updated = entry.clone();
        settings.store(&mut updated);
        if &updated != entry {
            vault.put_entry(updated);
        }
    }
}
