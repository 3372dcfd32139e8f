//! Configure command implementation.

use crate::session::Session;
use std::path::Path;
use tracing::warn;
use vaultsync_engine::{interval_label, load_settings, save_settings, SyncConfig};

/// Settings to change; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct Changes {
    /// Target URL.
    pub url: Option<String>,
    /// SFTP user name.
    pub username: Option<String>,
    /// SFTP password.
    pub password: Option<String>,
    /// Sync on open.
    pub sync_on_open: Option<bool>,
    /// Sync on save.
    pub sync_on_save: Option<bool>,
    /// Auto-sync interval in minutes.
    pub interval: Option<u32>,
}

/// Runs the configure command.
pub fn run(
    path: &Path,
    master_password: &str,
    changes: Changes,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(path, master_password)?;
    let (mut settings, _) = load_settings(&mut session.vault);

    if let Some(url) = changes.url {
        if let Err(e) = SyncConfig::parse(&url) {
            warn!(error = %e, "stored URL is not a usable sync target yet");
        }
        settings.url = url;
    }
    if let Some(username) = changes.username {
        settings.username = username;
    }
    if let Some(password) = changes.password {
        settings.password = password;
    }
    if let Some(on_open) = changes.sync_on_open {
        settings.sync_on_open = on_open;
    }
    if let Some(on_save) = changes.sync_on_save {
        settings.sync_on_save = on_save;
    }
    if let Some(minutes) = changes.interval {
        settings.interval_minutes = minutes;
    }

    save_settings(&mut session.vault, &settings);
    session.save_if_modified()?;

    println!("URL:            {}", settings.url);
    println!("User name:      {}", settings.username);
    println!("Sync on open:   {}", settings.sync_on_open);
    println!("Sync on save:   {}", settings.sync_on_save);
    println!("Auto-sync:      {}", interval_label(settings.interval_minutes));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vaultsync_core::{MasterKey, Vault};

    #[test]
    fn updates_only_given_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.kdbx");
        Vault::create(&path, MasterKey::from_password("pw"), "v").unwrap();

        run(
            &path,
            "pw",
            Changes {
                url: Some("sftp://nas:22/vaults/".into()),
                interval: Some(60),
                ..Changes::default()
            },
        )
        .unwrap();
        run(
            &path,
            "pw",
            Changes {
                sync_on_save: Some(true),
                ..Changes::default()
            },
        )
        .unwrap();

        let mut vault = Vault::open(&path, &MasterKey::from_password("pw")).unwrap();
        let (settings, _) = load_settings(&mut vault);
        assert_eq!(settings.url, "sftp://nas:22/vaults/");
        assert_eq!(settings.interval_minutes, 60);
        assert!(settings.sync_on_save);
        assert!(!settings.sync_on_open);
    }
}
