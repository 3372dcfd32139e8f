//! Status command implementation.

use crate::session::Session;
use serde::Serialize;
use std::path::Path;
use vaultsync_engine::{interval_label, load_settings, SyncConfig};

/// What `status` reports.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Vault path.
    pub path: String,
    /// Vault display name.
    pub name: String,
    /// Number of entries, including the settings entry.
    pub entries: usize,
    /// Stored target URL.
    pub url: String,
    /// Stored SFTP user name.
    pub username: String,
    /// Remote path the vault syncs to, if the URL is usable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
    /// Why the URL is not usable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_error: Option<String>,
    /// Sync on open.
    pub sync_on_open: bool,
    /// Sync on save.
    pub sync_on_save: bool,
    /// Auto-sync interval in minutes.
    pub interval_minutes: u32,
}

/// Runs the status command.
pub fn run(
    path: &Path,
    master_password: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(path, master_password)?;
    let (settings, _) = load_settings(&mut session.vault);
    session.save_if_modified()?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (remote_path, url_error) = match SyncConfig::parse(&settings.url) {
        Ok(config) => (Some(config.remote_db_path(&file_name)), None),
        Err(e) => (None, Some(format!("{e} ({})", e.reported_code()))),
    };

    let report = StatusReport {
        path: path.display().to_string(),
        name: session.vault.name().to_string(),
        entries: session.vault.len(),
        url: settings.url.clone(),
        username: settings.username.clone(),
        remote_path,
        url_error,
        sync_on_open: settings.sync_on_open,
        sync_on_save: settings.sync_on_save,
        interval_minutes: settings.interval_minutes,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_output(&report),
    }
    Ok(())
}

fn print_text_output(report: &StatusReport) {
    println!("Vault:          {} ({})", report.name, report.path);
    println!("Entries:        {}", report.entries);
    println!("URL:            {}", report.url);
    match (&report.remote_path, &report.url_error) {
        (Some(remote), _) => println!("Remote copy:    {remote}"),
        (None, Some(error)) => println!("Remote copy:    not configured: {error}"),
        (None, None) => {}
    }
    println!("User name:      {}", report.username);
    println!("Sync on open:   {}", report.sync_on_open);
    println!("Sync on save:   {}", report.sync_on_save);
    println!("Auto-sync:      {}", interval_label(report.interval_minutes));
}
