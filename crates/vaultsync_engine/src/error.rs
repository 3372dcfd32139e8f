//! Error types for the sync engine.

use crate::config::{ConfigError, Protocol};
use crate::remote::{ConnectFailure, RemoteError};
use crate::result::SyncResultCode;
use thiserror::Error;

/// Result type for the internal steps of a sync attempt.
pub type SyncResult<T> = Result<T, SyncError>;

/// Why a sync attempt stopped.
///
/// Every variant maps to exactly one [`SyncResultCode`]; the engine never
/// lets one of these escape [`SyncEngine::synchronize`](crate::SyncEngine::synchronize).
#[derive(Error, Debug)]
pub enum SyncError {
    /// The stored URL is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No endpoint factory is registered for the protocol.
    #[error("no endpoint registered for protocol {protocol}")]
    NoEndpoint {
        /// Requested protocol.
        protocol: Protocol,
    },

    /// Connecting failed and the cause points at the login.
    #[error("remote rejected credentials: {0}")]
    Credentials(String),

    /// Connecting failed for another reason.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The existing remote copy could not be fetched.
    #[error("download failed: {0}")]
    Download(String),

    /// The remote copy could not be opened or merged.
    #[error("merge failed: {0}")]
    Merge(String),

    /// The user refused to overwrite a corrupted remote copy.
    #[error("override of corrupted remote copy declined")]
    OverrideDeclined,

    /// Snapshot, backup rename or upload failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The re-downloaded artifact did not match what was uploaded.
    #[error("upload verification failed: {0}")]
    Verify(String),

    /// The session was no longer connected at finalize.
    #[error("remote session dropped before finalize")]
    Disconnected,

    /// Anything the other variants do not cover.
    #[error("{0}")]
    Unexpected(String),
}

impl SyncError {
    /// Creates a connect error, classifying it as a credentials problem
    /// when the cause points at the login.
    pub fn connect(error: RemoteError) -> Self {
        match error.connect_failure() {
            ConnectFailure::BadCredentials => Self::Credentials(error.to_string()),
            ConnectFailure::Other => Self::Connect(error.to_string()),
        }
    }

    /// Creates a download error.
    pub fn download(message: impl ToString) -> Self {
        Self::Download(message.to_string())
    }

    /// Creates a merge error.
    pub fn merge(message: impl ToString) -> Self {
        Self::Merge(message.to_string())
    }

    /// Creates an upload error.
    pub fn upload(message: impl ToString) -> Self {
        Self::Upload(message.to_string())
    }

    /// Creates a verification error.
    pub fn verify(message: impl ToString) -> Self {
        Self::Verify(message.to_string())
    }

    /// The result code this error terminates the attempt with.
    pub fn code(&self) -> SyncResultCode {
        match self {
            SyncError::Config(e) => e.reported_code(),
            SyncError::NoEndpoint { .. } => SyncResultCode::InvalidProtocol,
            SyncError::Credentials(_) => SyncResultCode::InvalidCredentials,
            SyncError::Connect(_) => SyncResultCode::ConnectFailed,
            SyncError::Download(_) => SyncResultCode::DownloadFailed,
            SyncError::Merge(_) | SyncError::OverrideDeclined => SyncResultCode::MergeFailed,
            SyncError::Upload(_) | SyncError::Verify(_) => SyncResultCode::UploadFailed,
            SyncError::Disconnected | SyncError::Unexpected(_) => SyncResultCode::UnknownError,
        }
    }
}
