//! # VaultSync Engine
//!
//! Keeps a local encrypted vault and its copy on a remote SFTP directory in
//! sync.
//!
//! This crate provides:
//! - Sync target derivation from the URL stored in the vault
//! - The remote endpoint capability and a registry keyed by protocol
//! - The sync state machine (validate → connect → reconcile → upload →
//!   verify → finalize)
//! - A streaming byte-equality verifier
//! - Result reporting, stored settings, the auto-sync timer and host
//!   lifecycle hooks
//!
//! ## Architecture
//!
//! Every attempt is **merge-then-publish**:
//! 1. Download the remote copy, if any, and merge it into the local vault
//! 2. Keep the previous remote copy as `<name>.bak`
//! 3. Upload a fresh snapshot of the merged vault
//! 4. Download it again and compare it byte for byte with the snapshot
//!
//! ## Key Invariants
//!
//! - Configuration errors are reported before any remote call
//! - Every attempt ends in exactly one [`SyncResultCode`]
//! - Scratch files never outlive the attempt that created them
//! - A corrupted remote copy is only replaced with the user's consent, or
//!   without asking when nobody is there to answer
//! - A remote copy that fails verification is deleted

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod engine;
mod error;
mod lifecycle;
mod remote;
mod report;
mod result;
mod scheduler;
mod scratch;
pub mod settings;
mod vault_adapter;
mod verify;

pub use config::{
    ConfigError, Credentials, EngineConfig, Protocol, SyncConfig, SyncContext,
    DEFAULT_STATUS_NAME, DEFAULT_VERIFY_CHUNK_SIZE,
};
pub use database::{DatabaseError, LocalDatabase, MergePolicy};
pub use engine::{
    CorruptionNotice, DeclineOverride, OverridePrompt, SyncEngine, SyncState, SyncStats,
};
pub use error::{SyncError, SyncResult};
pub use lifecycle::{HookAction, SyncHooks, AUTO_SYNC_STATUS};
#[cfg(feature = "sftp")]
pub use remote::{SftpEndpoint, SftpEndpointFactory};
pub use remote::{
    classify_connect_failure, ConnectFailure, EndpointFactory, EndpointRegistry, MemoryRemote,
    RemoteCall, RemoteEndpoint, RemoteError, RemoteResult,
};
pub use report::{ResultReporter, StatusSink};
pub use result::SyncResultCode;
pub use scheduler::{interval_label, AutoSyncTimer, TimerTick, INTERVAL_PRESETS};
pub use scratch::{TempDirBroker, TempFileBroker};
pub use settings::{
    load_settings, options_entry_uuid, save_settings, OptionsSource, SettingsStore, SyncSettings,
};
pub use verify::{files_equal, files_equal_with_chunk};
