//! Rekey command implementation.

use super::sync::after_save;
use crate::console::{interactive, ConsoleSink};
use crate::session::{master_password, Session};
use std::path::Path;
use vaultsync_core::MasterKey;
use vaultsync_engine::SyncEngine;

/// Changes the master key of the vault.
///
/// The remote copy still carries the old key, so the next sync finds it
/// unreadable and offers to override it with this vault.
pub fn run(
    engine: &SyncEngine,
    path: &Path,
    current_password: &str,
    new_password: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let new_password =
        master_password(new_password).map_err(|_| "new master password required (--new)")?;

    let mut session = Session::open(path, current_password)?;
    session
        .vault
        .set_master_key(MasterKey::from_password(&new_password));
    session.save_if_modified()?;
    println!("Master key changed for {}", path.display());

    after_save(engine, &mut session, interactive(), &mut ConsoleSink)?;
    Ok(())
}
