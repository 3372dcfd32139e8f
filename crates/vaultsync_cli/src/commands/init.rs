//! Init command implementation.

use crate::session::Session;
use std::path::Path;
use vaultsync_engine::load_settings;

/// Runs the init command.
pub fn run(
    path: &Path,
    master_password: &str,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string()),
    };

    let mut session = Session::create(path, master_password, &name)?;
    load_settings(&mut session.vault);
    session.save_if_modified()?;

    println!("Created vault {} at {}", name, path.display());
    println!("Set the sync target with `vaultsync configure --url sftp://host:22/dir/`");
    Ok(())
}
