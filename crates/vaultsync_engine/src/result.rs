//! Terminal outcome of a synchronization attempt.

use std::fmt;

/// The single result of one [`SyncEngine::synchronize`](crate::SyncEngine::synchronize) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncResultCode {
    /// Remote and local are reconciled and the upload was verified.
    Success,
    /// Catch-all, including a session found dead at finalize.
    UnknownError,
    /// The stored URL could not be turned into a configuration.
    InvalidParameters,
    /// The URL names a protocol with no registered endpoint.
    InvalidProtocol,
    /// The URL has no host.
    InvalidHost,
    /// The URL has no usable port.
    InvalidPort,
    /// The remote rejected the user name or password.
    InvalidCredentials,
    /// The URL has no remote directory.
    InvalidPath,
    /// The remote could not be reached.
    ConnectFailed,
    /// The existing remote copy could not be downloaded.
    DownloadFailed,
    /// Snapshot, backup rename, upload or verification failed.
    UploadFailed,
    /// The remote copy could not be merged, or the user refused to
    /// override a corrupted remote copy.
    MergeFailed,
}

impl SyncResultCode {
    /// Returns true for [`SyncResultCode::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, SyncResultCode::Success)
    }

    /// Returns true for codes produced before any network I/O.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SyncResultCode::InvalidParameters
                | SyncResultCode::InvalidProtocol
                | SyncResultCode::InvalidHost
                | SyncResultCode::InvalidPort
                | SyncResultCode::InvalidPath
        )
    }

    /// Stable identifier, used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncResultCode::Success => "success",
            SyncResultCode::UnknownError => "unknown_error",
            SyncResultCode::InvalidParameters => "invalid_parameters",
            SyncResultCode::InvalidProtocol => "invalid_protocol",
            SyncResultCode::InvalidHost => "invalid_host",
            SyncResultCode::InvalidPort => "invalid_port",
            SyncResultCode::InvalidCredentials => "invalid_credentials",
            SyncResultCode::InvalidPath => "invalid_path",
            SyncResultCode::ConnectFailed => "connect_failed",
            SyncResultCode::DownloadFailed => "download_failed",
            SyncResultCode::UploadFailed => "upload_failed",
            SyncResultCode::MergeFailed => "merge_failed",
        }
    }
}

impl fmt::Display for SyncResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_codes() {
        assert!(SyncResultCode::InvalidParameters.is_configuration_error());
        assert!(SyncResultCode::InvalidProtocol.is_configuration_error());
        assert!(SyncResultCode::InvalidPath.is_configuration_error());
        assert!(!SyncResultCode::InvalidCredentials.is_configuration_error());
        assert!(!SyncResultCode::ConnectFailed.is_configuration_error());
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(SyncResultCode::UploadFailed.to_string(), "upload_failed");
        assert!(SyncResultCode::Success.is_success());
        assert!(!SyncResultCode::MergeFailed.is_success());
    }
}
