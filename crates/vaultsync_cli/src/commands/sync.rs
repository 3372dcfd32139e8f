//! Sync command implementation.

use crate::console::{ConsoleSink, TerminalPrompt};
use crate::session::Session;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use vaultsync_core::Vault;
use vaultsync_engine::{
    load_settings, DeclineOverride, EndpointRegistry, EngineConfig, HookAction, Protocol,
    ResultReporter, StatusSink, SyncEngine, SyncHooks, SyncResultCode, SyncSettings,
};

/// Engine with every protocol compiled into this build.
pub fn build_engine() -> SyncEngine {
    let registry = EndpointRegistry::standard();
    if !registry.supports(Protocol::Sftp) {
        info!("built without SFTP support, every sync will report an invalid protocol");
    }
    SyncEngine::new(EngineConfig::new(), registry)
}

/// Runs one attempt and reports it.
pub fn attempt(
    engine: &SyncEngine,
    vault: &mut Vault,
    settings: &SyncSettings,
    attended: bool,
    sink: &mut dyn StatusSink,
) -> SyncResultCode {
    let reporter = ResultReporter::new(engine.config().status_name.clone());
    sink.set_status(&reporter.synchronizing());

    let ctx = settings.context(attended);
    let code = if attended {
        engine.synchronize(vault, &ctx, &mut TerminalPrompt::stdio())
    } else {
        engine.synchronize(vault, &ctx, &mut DeclineOverride)
    };

    reporter.report(code, attended, sink);
    code
}

/// Follows a save with an attempt when the vault has sync-on-save enabled.
///
/// `interactive` says whether someone can answer a prompt. Returns the
/// attempt's code, or `None` when no attempt was due.
pub fn after_save(
    engine: &SyncEngine,
    session: &mut Session,
    interactive: bool,
    sink: &mut dyn StatusSink,
) -> Result<Option<SyncResultCode>, Box<dyn std::error::Error>> {
    let (settings, _) = load_settings(&mut session.vault);
    let mut hooks = SyncHooks::new();
    // Open-time syncs belong to `sync` and `watch`.
    hooks.on_database_opened(&settings, Instant::now());

    let code = match hooks.on_database_saved(interactive) {
        HookAction::Synchronize { attended } => {
            hooks.before_attempt();
            let code = attempt(engine, &mut session.vault, &settings, attended, sink);
            debug!(code = %code, "sync after save finished");
            Some(code)
        }
        _ => None,
    };

    session.save_if_modified()?;
    hooks.on_database_closed();
    Ok(code)
}

/// Runs the sync command.
pub fn run(
    path: &Path,
    master_password: &str,
    attended: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(path, master_password)?;
    let (settings, _) = load_settings(&mut session.vault);

    let engine = build_engine();
    let code = attempt(&engine, &mut session.vault, &settings, attended, &mut ConsoleSink);

    // Keep what was merged in, whatever the outcome.
    session.save_if_modified()?;

    if code.is_success() {
        Ok(())
    } else {
        Err(format!("synchronization failed: {code}").into())
    }
}
