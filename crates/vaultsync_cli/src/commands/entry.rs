//! Entry command implementations.

use super::sync::after_save;
use crate::console::{interactive, ConsoleSink};
use crate::session::Session;
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;
use vaultsync_core::{fields, Entry};
use vaultsync_engine::{options_entry_uuid, settings::APP_NAME, SyncEngine};

/// Fields of an entry to add.
pub struct NewEntry<'a> {
    /// Title.
    pub title: &'a str,
    /// User name.
    pub username: Option<&'a str>,
    /// Password.
    pub password: Option<&'a str>,
    /// URL.
    pub url: Option<&'a str>,
    /// Notes.
    pub notes: Option<&'a str>,
}

/// One row of `entry list`.
#[derive(Debug, Serialize)]
pub struct EntrySummary {
    /// Entry id.
    pub id: String,
    /// Title, if set.
    pub title: Option<String>,
    /// User name, if set.
    pub username: Option<String>,
    /// Last modification, milliseconds since the Unix epoch.
    pub modified_at: u64,
    /// Whether this is the sync settings entry.
    pub settings: bool,
}

/// Adds an entry, saves, and syncs if the vault asks for it.
pub fn add(
    engine: &SyncEngine,
    path: &Path,
    master_password: &str,
    new: NewEntry<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(path, master_password)?;

    let mut entry = Entry::new();
    entry.set_field(fields::TITLE, new.title);
    for (name, value) in [
        (fields::USER_NAME, new.username),
        (fields::PASSWORD, new.password),
        (fields::URL, new.url),
        (fields::NOTES, new.notes),
    ] {
        if let Some(value) = value {
            entry.set_field(name, value);
        }
    }

    let id = entry.uuid();
    session.vault.put_entry(entry);
    session.save_if_modified()?;
    println!("{id}");

    after_save(engine, &mut session, interactive(), &mut ConsoleSink)?;
    Ok(())
}

/// Lists entries.
pub fn list(
    path: &Path,
    master_password: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(path, master_password)?;
    let settings_id = options_entry_uuid(APP_NAME);

    let mut rows: Vec<EntrySummary> = session
        .vault
        .entries()
        .map(|entry| EntrySummary {
            id: entry.uuid().to_string(),
            title: entry.title().map(str::to_string),
            username: entry.field(fields::USER_NAME).map(str::to_string),
            modified_at: entry.modified_at(),
            settings: entry.uuid() == settings_id,
        })
        .collect();
    rows.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            for row in &rows {
                println!(
                    "{}  {}{}",
                    row.id,
                    row.title.as_deref().unwrap_or("<untitled>"),
                    if row.settings { "  (sync settings)" } else { "" }
                );
            }
            println!("{} entries", rows.len());
        }
    }
    Ok(())
}

/// Removes an entry, saves, and syncs if the vault asks for it.
pub fn remove(
    engine: &SyncEngine,
    path: &Path,
    master_password: &str,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let uuid = Uuid::parse_str(id)?;
    let mut session = Session::open(path, master_password)?;
    session.vault.remove_entry(&uuid)?;
    session.save_if_modified()?;
    println!("Removed {uuid}");

    after_save(engine, &mut session, interactive(), &mut ConsoleSink)?;
    Ok(())
}
