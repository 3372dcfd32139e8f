//! Watch command implementation.

use super::sync::{attempt, build_engine};
use crate::console::ConsoleSink;
use crate::session::Session;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use vaultsync_engine::{load_settings, HookAction, OptionsSource, StatusSink, SyncHooks};

const TICK: Duration = Duration::from_secs(1);

/// Runs the watch command: keeps the vault open and syncs on its interval.
pub fn run(
    path: &Path,
    master_password: &str,
    max_attempts: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(path, master_password)?;
    let (mut settings, source) = load_settings(&mut session.vault);
    session.save_if_modified()?;

    if source == OptionsSource::Created {
        return Err("sync settings were just created; run `vaultsync configure` first".into());
    }
    if settings.interval_minutes == 0 && !settings.sync_on_open {
        return Err(
            "auto-sync is disabled; set an interval with `vaultsync configure --interval`".into(),
        );
    }

    let engine = build_engine();
    let mut sink = ConsoleSink;
    let mut hooks = SyncHooks::new();
    let mut attempts = 0u64;

    let mut action = hooks.on_database_opened(&settings, Instant::now());
    loop {
        match action {
            HookAction::None => {}
            HookAction::ShowStatus(text) => sink.set_status(&text),
            HookAction::Synchronize { attended } => {
                hooks.before_attempt();
                let code = attempt(&engine, &mut session.vault, &settings, attended, &mut sink);
                session.save_if_modified()?;
                hooks.after_attempt(Instant::now());
                attempts += 1;
                debug!(code = %code, attempts, "attempt finished");

                if max_attempts.is_some_and(|max| attempts >= max) {
                    break;
                }

                // A merge may have brought in settings changed on another device.
                let (latest, _) = load_settings(&mut session.vault);
                session.save_if_modified()?;
                let changed = hooks.on_settings_changed(&latest, Instant::now());
                if let HookAction::ShowStatus(text) = changed {
                    sink.set_status(&text);
                }
                settings = latest;
                if !hooks.timer().is_enabled() {
                    break;
                }
            }
        }

        thread::sleep(TICK);
        action = hooks.on_tick(Instant::now());
    }

    hooks.on_database_closed();
    Ok(())
}
