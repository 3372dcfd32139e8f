//! Sync target configuration, credentials and engine tunables.

use crate::result::SyncResultCode;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Remote file-transfer protocols the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// SSH file transfer protocol.
    Sftp,
}

impl Protocol {
    /// URL scheme for this protocol.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Sftp => "sftp",
        }
    }

    /// Looks up a protocol by URL scheme (case-insensitive).
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        if scheme.eq_ignore_ascii_case("sftp") {
            Some(Protocol::Sftp)
        } else {
            None
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Why a stored URL did not yield a [`SyncConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Not a URL at all.
    #[error("malformed url: {0}")]
    Malformed(String),

    /// Well-formed URL with a scheme other than `sftp`.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// No host, or an empty one.
    #[error("url has no host")]
    MissingHost,

    /// Port absent, zero, or out of range.
    #[error("url has no valid port")]
    InvalidPort,

    /// No remote directory.
    #[error("url has no remote path")]
    MissingPath,
}

impl ConfigError {
    /// Fine-grained result code for this error.
    pub fn code(&self) -> SyncResultCode {
        match self {
            ConfigError::Malformed(_) => SyncResultCode::InvalidParameters,
            ConfigError::UnsupportedProtocol(_) => SyncResultCode::InvalidProtocol,
            ConfigError::MissingHost => SyncResultCode::InvalidHost,
            ConfigError::InvalidPort => SyncResultCode::InvalidPort,
            ConfigError::MissingPath => SyncResultCode::InvalidPath,
        }
    }

    /// Code reported to callers of the engine.
    ///
    /// Only an unsupported scheme is told apart; every other problem with
    /// the URL surfaces as [`SyncResultCode::InvalidParameters`].
    pub fn reported_code(&self) -> SyncResultCode {
        match self {
            ConfigError::UnsupportedProtocol(_) => SyncResultCode::InvalidProtocol,
            _ => SyncResultCode::InvalidParameters,
        }
    }
}

/// Parsed sync target.
///
/// Derived from the stored URL at the start of every attempt and never
/// persisted itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Transfer protocol.
    pub protocol: Protocol,
    /// Remote host name or address.
    pub host: String,
    /// Remote port, always explicit in the URL.
    pub port: u16,
    /// Remote directory holding the database artifact.
    pub remote_dir: String,
}

impl SyncConfig {
    /// Parses a stored URL such as `sftp://example.org:22/backups/`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                if let Some(scheme) = leading_scheme(raw) {
                    if Protocol::from_scheme(scheme).is_none() {
                        return Err(ConfigError::UnsupportedProtocol(scheme.to_ascii_lowercase()));
                    }
                }
                return Err(match e {
                    url::ParseError::InvalidPort => ConfigError::InvalidPort,
                    url::ParseError::EmptyHost => ConfigError::MissingHost,
                    other => ConfigError::Malformed(other.to_string()),
                });
            }
        };

        let protocol = Protocol::from_scheme(url.scheme())
            .ok_or_else(|| ConfigError::UnsupportedProtocol(url.scheme().to_string()))?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(ConfigError::MissingHost),
        };

        let port = match url.port() {
            Some(port) if port > 0 => port,
            _ => return Err(ConfigError::InvalidPort),
        };

        // The url crate keeps the path percent-encoded; the remote wants it raw.
        let remote_dir = urlencoding::decode(url.path())
            .map_err(|e| ConfigError::Malformed(format!("path is not UTF-8: {e}")))?;
        if remote_dir.is_empty() {
            return Err(ConfigError::MissingPath);
        }

        Ok(Self {
            protocol,
            host,
            port,
            remote_dir: remote_dir.into_owned(),
        })
    }

    /// Parses a stored URL, treating any problem as "not configured".
    pub fn from_url(raw: &str) -> Option<Self> {
        Self::parse(raw).ok()
    }

    /// Remote path of the database artifact named `file_name`.
    pub fn remote_db_path(&self, file_name: &str) -> String {
        if self.remote_dir.ends_with('/') {
            format!("{}{}", self.remote_dir, file_name)
        } else {
            format!("{}/{}", self.remote_dir, file_name)
        }
    }
}

/// Scheme prefix of `scheme://...`, if it looks like one.
fn leading_scheme(raw: &str) -> Option<&str> {
    let (scheme, _) = raw.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}

/// Remote login.
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Remote user name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Remote password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything one synchronization attempt needs from its caller.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Whether a user is present to answer prompts.
    pub attended: bool,
    /// Stored target URL.
    pub url: String,
    /// Remote login.
    pub credentials: Credentials,
}

impl SyncContext {
    /// Context for a user-initiated attempt.
    pub fn attended(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            attended: true,
            url: url.into(),
            credentials,
        }
    }

    /// Context for a background attempt that must never block on input.
    pub fn unattended(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            attended: false,
            url: url.into(),
            credentials,
        }
    }
}

/// Default verifier chunk size.
pub const DEFAULT_VERIFY_CHUNK_SIZE: usize = 64 * 1024;

/// Default application name shown in status lines.
pub const DEFAULT_STATUS_NAME: &str = "VaultSync";

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for scratch copies. `None` uses the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// Read size used when verifying an upload.
    pub verify_chunk_size: usize,
    /// Name prefixed to status lines and dialog titles.
    pub status_name: String,
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            scratch_dir: None,
            verify_chunk_size: DEFAULT_VERIFY_CHUNK_SIZE,
            status_name: DEFAULT_STATUS_NAME.to_string(),
        }
    }

    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Sets the verifier chunk size.
    pub fn with_verify_chunk_size(mut self, size: usize) -> Self {
        self.verify_chunk_size = size;
        self
    }

    /// Sets the status-line name.
    pub fn with_status_name(mut self, name: impl Into<String>) -> Self {
        self.status_name = name.into();
        self
    }

    /// Effective scratch directory.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// File name of a local database path, as used on the remote side.
pub(crate) fn remote_file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
