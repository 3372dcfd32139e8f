//! Test fixtures and sync helpers.
//!
//! Provides vaults in temporary directories and a test bed that runs the
//! sync engine against an in-memory remote.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;
use vaultsync_core::{fields, Entry, KdfParams, MasterKey, Vault};
use vaultsync_engine::{
    CorruptionNotice, Credentials, EndpointRegistry, EngineConfig, MemoryRemote, OverridePrompt,
    Protocol, StatusSink, SyncContext, SyncEngine, SyncResultCode,
};

/// Master password used by every fixture vault.
pub const MASTER_PASSWORD: &str = "correct horse battery staple";

/// Target URL the test bed syncs against.
pub const TEST_URL: &str = "sftp://nas:22/backups/";

/// Remote directory of [`TEST_URL`].
pub const TEST_REMOTE_DIR: &str = "/backups/";

/// Login accepted by the test bed's remote.
pub const TEST_USER: &str = "alice";

/// Password accepted by the test bed's remote.
pub const TEST_PASSWORD: &str = "sftp-secret";

/// The fixture master key.
pub fn master_key() -> MasterKey {
    MasterKey::from_password(MASTER_PASSWORD)
}

/// Cheapest Argon2 cost, so fixture vaults open quickly.
pub fn fast_kdf() -> KdfParams {
    KdfParams::new(64, 1, 1).expect("Invalid kdf cost")
}

/// Creates and saves an empty vault at `path` with the fixture key and
/// [`fast_kdf`].
pub fn create_vault(path: impl Into<PathBuf>, name: &str) -> Vault {
    let mut vault = Vault::new(path, master_key(), name);
    vault.set_kdf_params(fast_kdf());
    vault.save().expect("Failed to create vault");
    vault
}

/// Credentials accepted by the test bed.
pub fn test_credentials() -> Credentials {
    Credentials::new(TEST_USER, TEST_PASSWORD)
}

/// Attended context for `url` with the test credentials.
pub fn attended_ctx(url: &str) -> SyncContext {
    SyncContext::attended(url, test_credentials())
}

/// Unattended context for `url` with the test credentials.
pub fn unattended_ctx(url: &str) -> SyncContext {
    SyncContext::unattended(url, test_credentials())
}

/// Remote path of `file_name` under [`TEST_REMOTE_DIR`].
pub fn remote_path(file_name: &str) -> String {
    format!("{TEST_REMOTE_DIR}{file_name}")
}

/// A saved vault in its own temporary directory.
pub struct TestVault {
    /// The vault.
    pub vault: Vault,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestVault {
    /// Creates an empty vault file named `file_name`.
    pub fn new(file_name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let vault = create_vault(temp_dir.path().join(file_name), "test");
        Self {
            vault,
            _temp_dir: temp_dir,
        }
    }

    /// Directory holding the vault file.
    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Reads the vault file again from disk.
    pub fn reopen(&self) -> Vault {
        Vault::open(self.vault.path(), &master_key()).expect("Failed to reopen vault")
    }
}

impl std::ops::Deref for TestVault {
    type Target = Vault;

    fn deref(&self) -> &Self::Target {
        &self.vault
    }
}

impl std::ops::DerefMut for TestVault {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vault
    }
}

/// A sync engine wired to an in-memory remote.
///
/// The remote accepts only [`TEST_USER`] / [`TEST_PASSWORD`]. Scratch files
/// go to a dedicated directory so tests can assert it ends up empty.
pub struct TestBed {
    /// Shared handle on the remote the engine talks to.
    pub remote: MemoryRemote,
    /// The engine under test.
    pub engine: SyncEngine,
    scratch_dir: PathBuf,
    _temp_dir: TempDir,
}

impl Default for TestBed {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBed {
    /// Creates a test bed with an empty remote.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new())
    }

    /// Creates a test bed from `config`; its scratch directory is replaced.
    pub fn with_config(config: EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let scratch_dir = temp_dir.path().join("scratch");
        let remote = MemoryRemote::new();
        remote.require_login(TEST_USER, TEST_PASSWORD);
        let engine = SyncEngine::new(
            config.with_scratch_dir(&scratch_dir),
            memory_registry(&remote),
        );
        Self {
            remote,
            engine,
            scratch_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Root of the bed's temporary directory.
    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Directory the engine allocates scratch files in.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Returns true if no scratch file is left over.
    pub fn scratch_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.scratch_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    /// Creates a vault file `<device>/<file_name>` inside the bed.
    ///
    /// Different devices may use the same file name, as two machines
    /// syncing the same remote copy would.
    pub fn device_vault(&self, device: &str, file_name: &str) -> Vault {
        let dir = self.dir().join(device);
        std::fs::create_dir_all(&dir).expect("Failed to create device directory");
        create_vault(dir.join(file_name), device)
    }

    /// Creates a vault file for the default device.
    pub fn vault(&self, file_name: &str) -> Vault {
        self.device_vault("local", file_name)
    }

    /// Syncs `vault` against [`TEST_URL`], declining any override prompt.
    pub fn sync(&self, vault: &mut Vault, attended: bool) -> SyncResultCode {
        let mut prompt = ScriptedPrompt::decline();
        self.sync_with(vault, attended, &mut prompt)
    }

    /// Syncs `vault` against [`TEST_URL`] with a given prompt.
    pub fn sync_with(
        &self,
        vault: &mut Vault,
        attended: bool,
        prompt: &mut dyn OverridePrompt,
    ) -> SyncResultCode {
        let ctx = if attended {
            attended_ctx(TEST_URL)
        } else {
            unattended_ctx(TEST_URL)
        };
        self.engine.synchronize(vault, &ctx, prompt)
    }
}

/// Registry serving every protocol from `remote`.
pub fn memory_registry(remote: &MemoryRemote) -> EndpointRegistry {
    EndpointRegistry::new().with(Protocol::Sftp, remote.clone())
}

/// An [`OverridePrompt`] with a fixed answer that records what it was shown.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answer: bool,
    /// Notices shown so far.
    pub notices: Vec<CorruptionNotice>,
}

impl ScriptedPrompt {
    /// Always answers yes.
    pub fn accept() -> Self {
        Self {
            answer: true,
            notices: Vec::new(),
        }
    }

    /// Always answers no.
    pub fn decline() -> Self {
        Self::default()
    }

    /// Number of times the prompt was shown.
    pub fn times_asked(&self) -> usize {
        self.notices.len()
    }
}

impl OverridePrompt for ScriptedPrompt {
    fn confirm_override(&mut self, notice: &CorruptionNotice) -> bool {
        self.notices.push(notice.clone());
        self.answer
    }
}

/// A [`StatusSink`] that records everything it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Status lines, in order.
    pub statuses: Vec<String>,
    /// Error dialogs as `(title, message)`, in order.
    pub errors: Vec<(String, String)>,
}

impl StatusSink for RecordingSink {
    fn set_status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.errors.push((title.to_string(), message.to_string()));
    }
}

/// Builds an entry with a title and password.
pub fn sample_entry(title: &str, password: &str) -> Entry {
    let mut entry = Entry::new();
    entry.set_field(fields::TITLE, title);
    entry.set_field(fields::PASSWORD, password);
    entry
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Adds `count` entries titled `entry-<n>` and saves.
    pub fn populate(vault: &mut Vault, count: usize) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let entry = sample_entry(&format!("entry-{i}"), &format!("pw-{i}"));
            ids.push(entry.uuid());
            vault.put_entry(entry);
        }
        vault.save().expect("Failed to save vault");
        ids
    }

    /// Stores bytes that no vault can open at the remote path of `file_name`.
    pub fn corrupt_remote(bed: &TestBed, file_name: &str) -> Vec<u8> {
        let garbage = b"definitely not a vault file".to_vec();
        bed.remote.put_file(remote_path(file_name), garbage.clone());
        garbage
    }

    /// A vault whose remote copy was uploaded by a first successful sync.
    pub fn synced_vault(bed: &TestBed, file_name: &str, entries: usize) -> Vault {
        let mut vault = bed.vault(file_name);
        populate(&mut vault, entries);
        let code = bed.sync(&mut vault, true);
        assert_eq!(code, SyncResultCode::Success, "initial sync failed");
        bed.remote.clear_calls();
        vault
    }
}
