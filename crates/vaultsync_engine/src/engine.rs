//! Sync engine state machine.

use crate::config::{remote_file_name, EngineConfig, SyncConfig, SyncContext};
use crate::database::{LocalDatabase, MergePolicy};
use crate::error::{SyncError, SyncResult};
use crate::remote::{EndpointRegistry, RemoteEndpoint, RemoteResult};
use crate::result::SyncResultCode;
use crate::scratch::{ScratchFile, TempDirBroker, TempFileBroker};
use crate::verify::files_equal_with_chunk;
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No attempt has run yet.
    Idle,
    /// Deriving the target from the stored URL.
    Validating,
    /// Opening the remote session.
    Connecting,
    /// Downloading and merging the remote copy.
    Reconciling,
    /// Snapshotting, backing up and uploading.
    Uploading,
    /// Re-downloading and comparing the upload.
    Verifying,
    /// Cleaning up and disconnecting.
    Finalizing,
    /// The last attempt succeeded.
    Synced,
    /// The last attempt failed.
    Failed,
}

impl SyncState {
    /// Returns true while an attempt is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle | SyncState::Synced | SyncState::Failed)
    }
}

/// Statistics about sync attempts.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Attempts run to a terminal code.
    pub attempts: u64,
    /// Attempts that ended in [`SyncResultCode::Success`].
    pub successes: u64,
    /// Attempts that ended in any other code.
    pub failures: u64,
    /// Code of the most recent attempt.
    pub last_result: Option<SyncResultCode>,
    /// Wall-clock time the most recent attempt finished.
    pub last_attempt: Option<SystemTime>,
    /// Duration of the most recent attempt.
    pub last_duration: Option<Duration>,
}

/// Details shown when the remote copy cannot be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptionNotice {
    /// Remote path of the unreadable artifact.
    pub remote_path: String,
    /// Error raised while opening it.
    pub cause: String,
}

impl CorruptionNotice {
    /// Dialog title.
    pub const TITLE: &'static str = "Unable to open remote file";

    /// Warning text for the override question.
    pub fn message(&self) -> String {
        format!(
            "The remote database file {} may be corrupted.\n\
             Do you want to override it with the LOCAL database file?\n\
             WARNING:\n\
             - If you have changed the master key of the LOCAL database \
             since the last sync, answer yes.\n\
             - If you have changed the master key on ANOTHER device \
             since the last sync, answer no, \
             THEN update the master key of the LOCAL database and THEN sync again.",
            self.remote_path
        )
    }
}

/// Asks whether a corrupted remote copy may be overwritten.
///
/// Only consulted for attended attempts.
pub trait OverridePrompt {
    /// Returns true to overwrite the remote copy with the local one.
    fn confirm_override(&mut self, notice: &CorruptionNotice) -> bool;
}

impl<F> OverridePrompt for F
where
    F: FnMut(&CorruptionNotice) -> bool,
{
    fn confirm_override(&mut self, notice: &CorruptionNotice) -> bool {
        self(notice)
    }
}

/// A prompt that always refuses. For hosts with no way to ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineOverride;

impl OverridePrompt for DeclineOverride {
    fn confirm_override(&mut self, _notice: &CorruptionNotice) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct Reconciled {
    local_saved: bool,
    corruption: Option<String>,
}

/// Keeps a local database and its remote copy in sync.
///
/// Each call to [`synchronize`](Self::synchronize) is one self-contained
/// attempt: derive the target, connect, merge any remote copy, back it up,
/// upload a fresh snapshot, verify it byte for byte, and disconnect.
pub struct SyncEngine {
    config: EngineConfig,
    registry: EndpointRegistry,
    broker: Box<dyn TempFileBroker>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    in_flight: Mutex<()>,
}

impl SyncEngine {
    /// Creates an engine with scratch files in the configured directory.
    pub fn new(config: EngineConfig, registry: EndpointRegistry) -> Self {
        let broker = TempDirBroker::new(config.scratch_dir());
        Self {
            config,
            registry,
            broker: Box::new(broker),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            in_flight: Mutex::new(()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs one synchronization attempt and returns its terminal code.
    ///
    /// Never panics on remote or local failures and never leaves scratch
    /// files behind. Safe to call again after any code.
    pub fn synchronize<D: LocalDatabase>(
        &self,
        db: &mut D,
        ctx: &SyncContext,
        prompt: &mut dyn OverridePrompt,
    ) -> SyncResultCode {
        let Some(_guard) = self.in_flight.try_lock() else {
            warn!("synchronization already in progress");
            return SyncResultCode::UnknownError;
        };

        let started = Instant::now();
        info!(attended = ctx.attended, "synchronization started");

        let outcome = self.attempt(db, ctx, prompt);
        let code = match &outcome {
            Ok(()) => {
                self.set_state(SyncState::Synced);
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "synchronization succeeded"
                );
                SyncResultCode::Success
            }
            Err(e) => {
                self.set_state(SyncState::Failed);
                let code = e.code();
                warn!(code = %code, error = %e, "synchronization failed");
                code
            }
        };

        let mut stats = self.stats.write();
        stats.attempts += 1;
        if code.is_success() {
            stats.successes += 1;
        } else {
            stats.failures += 1;
        }
        stats.last_result = Some(code);
        stats.last_attempt = Some(SystemTime::now());
        stats.last_duration = Some(started.elapsed());

        code
    }

    fn attempt<D: LocalDatabase>(
        &self,
        db: &mut D,
        ctx: &SyncContext,
        prompt: &mut dyn OverridePrompt,
    ) -> SyncResult<()> {
        self.set_state(SyncState::Validating);
        let config = SyncConfig::parse(&ctx.url).inspect_err(|e| {
            debug!(code = %e.code(), error = %e, "sync url rejected");
        })?;

        let factory = self
            .registry
            .get(config.protocol)
            .ok_or(SyncError::NoEndpoint {
                protocol: config.protocol,
            })?;

        let file_name = remote_file_name(db.io_path()).ok_or_else(|| {
            SyncError::Unexpected(format!(
                "database path {} has no file name",
                db.io_path().display()
            ))
        })?;
        let remote_path = config.remote_db_path(&file_name);

        self.set_state(SyncState::Connecting);
        info!(
            host = %config.host,
            port = config.port,
            user = ctx.credentials.username(),
            "connecting"
        );
        let mut endpoint = factory.create(&config, &ctx.credentials);
        endpoint.connect().map_err(SyncError::connect)?;

        let result = self.run_connected(endpoint.as_mut(), db, ctx, prompt, &remote_path);
        if result.is_err() && endpoint.is_connected() {
            endpoint.disconnect();
        }
        result
    }

    fn run_connected<D: LocalDatabase>(
        &self,
        endpoint: &mut dyn RemoteEndpoint,
        db: &mut D,
        ctx: &SyncContext,
        prompt: &mut dyn OverridePrompt,
        remote_path: &str,
    ) -> SyncResult<()> {
        self.set_state(SyncState::Reconciling);
        let reconciled = self.reconcile(endpoint, db, remote_path)?;

        if let Some(cause) = reconciled.corruption {
            let notice = CorruptionNotice {
                remote_path: remote_path.to_string(),
                cause,
            };
            if ctx.attended && !prompt.confirm_override(&notice) {
                return Err(SyncError::OverrideDeclined);
            }

            warn!(
                remote = %remote_path,
                attended = ctx.attended,
                "overriding corrupted remote copy"
            );
            // The .bak generation is left alone.
            if endpoint.exists(remote_path).map_err(SyncError::upload)? {
                endpoint.delete(remote_path).map_err(SyncError::upload)?;
            }
        }

        self.set_state(SyncState::Uploading);
        let snapshot = self.publish(endpoint, db, remote_path, reconciled.local_saved)?;

        self.set_state(SyncState::Verifying);
        self.verify_upload(endpoint, remote_path, &snapshot)?;

        self.set_state(SyncState::Finalizing);
        if let Err(e) = snapshot.remove() {
            warn!(error = %e, "failed to delete snapshot");
        }
        if !endpoint.is_connected() {
            return Err(SyncError::Disconnected);
        }
        endpoint.disconnect();
        Ok(())
    }

    /// Downloads and merges the remote copy if there is one.
    fn reconcile<D: LocalDatabase>(
        &self,
        endpoint: &mut dyn RemoteEndpoint,
        db: &mut D,
        remote_path: &str,
    ) -> SyncResult<Reconciled> {
        let mut reconciled = Reconciled::default();

        if !endpoint.exists(remote_path).map_err(SyncError::download)? {
            debug!(remote = %remote_path, "no remote copy, skipping merge");
            return Ok(reconciled);
        }

        let scratch = ScratchFile::allocate(self.broker.as_ref()).map_err(SyncError::download)?;
        download_to(endpoint, remote_path, scratch.path()).map_err(SyncError::download)?;
        debug!(remote = %remote_path, "downloaded remote copy");

        let remote = match D::open(scratch.path(), db.master_key()) {
            Ok(remote) => remote,
            Err(e) if e.is_integrity_failure() => {
                warn!(remote = %remote_path, error = %e, "remote copy cannot be opened");
                reconciled.corruption = Some(e.to_string());
                return Ok(reconciled);
            }
            Err(e) => return Err(SyncError::merge(e)),
        };

        db.save().map_err(SyncError::merge)?;
        reconciled.local_saved = true;
        db.merge_in(&remote, MergePolicy::Synchronize)
            .map_err(SyncError::merge)?;
        remote.close();

        info!(remote = %remote_path, "merged remote copy");
        Ok(reconciled)
    }

    /// Saves, snapshots, backs up the remote copy and uploads the snapshot.
    ///
    /// A failed upload leaves the previous generation as `<path>.bak`; it is
    /// not renamed back.
    fn publish<D: LocalDatabase>(
        &self,
        endpoint: &mut dyn RemoteEndpoint,
        db: &mut D,
        remote_path: &str,
        local_saved: bool,
    ) -> SyncResult<ScratchFile> {
        if !local_saved {
            db.save().map_err(SyncError::upload)?;
        }

        let snapshot = ScratchFile::allocate(self.broker.as_ref()).map_err(SyncError::upload)?;
        db.save_as(snapshot.path()).map_err(SyncError::upload)?;

        if endpoint.exists(remote_path).map_err(SyncError::upload)? {
            let backup = format!("{remote_path}.bak");
            if endpoint.exists(&backup).map_err(SyncError::upload)? {
                endpoint.delete(&backup).map_err(SyncError::upload)?;
            }
            endpoint
                .rename(remote_path, &backup)
                .map_err(SyncError::upload)?;
            debug!(backup = %backup, "previous remote copy kept as backup");
        }

        let file = File::open(snapshot.path()).map_err(SyncError::upload)?;
        let bytes = file.metadata().map(|m| m.len()).unwrap_or_default();
        let mut source = BufReader::new(file);
        endpoint
            .upload(&mut source, remote_path)
            .map_err(SyncError::upload)?;

        info!(remote = %remote_path, bytes, "uploaded snapshot");
        Ok(snapshot)
    }

    /// Re-downloads the upload and compares it with the snapshot.
    fn verify_upload(
        &self,
        endpoint: &mut dyn RemoteEndpoint,
        remote_path: &str,
        snapshot: &ScratchFile,
    ) -> SyncResult<()> {
        if !endpoint.exists(remote_path).map_err(SyncError::upload)? {
            return Err(SyncError::verify("remote copy missing after upload"));
        }

        let fetched = ScratchFile::allocate(self.broker.as_ref()).map_err(SyncError::upload)?;
        let equal = match download_to(endpoint, remote_path, fetched.path()) {
            Ok(()) => match files_equal_with_chunk(
                fetched.path(),
                snapshot.path(),
                self.config.verify_chunk_size,
            ) {
                Ok(equal) => equal,
                Err(e) => {
                    warn!(error = %e, "comparison failed");
                    false
                }
            },
            Err(e) => {
                warn!(remote = %remote_path, error = %e, "re-download failed");
                false
            }
        };
        drop(fetched);

        if equal {
            debug!(remote = %remote_path, "upload verified");
            return Ok(());
        }

        warn!(remote = %remote_path, "uploaded copy differs from snapshot, removing it");
        match endpoint.exists(remote_path) {
            Ok(true) => {
                if let Err(e) = endpoint.delete(remote_path) {
                    warn!(remote = %remote_path, error = %e, "failed to remove bad upload");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(remote = %remote_path, error = %e, "failed to check bad upload"),
        }
        Err(SyncError::verify(format!(
            "{remote_path} does not match the uploaded snapshot"
        )))
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("state", &self.state())
            .finish()
    }
}

fn download_to(
    endpoint: &mut dyn RemoteEndpoint,
    remote_path: &str,
    local: &Path,
) -> RemoteResult<()> {
    let mut sink = BufWriter::new(File::create(local)?);
    endpoint.download(remote_path, &mut sink)?;
    sink.flush()?;
    Ok(())
}
