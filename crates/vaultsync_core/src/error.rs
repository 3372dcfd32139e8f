//! Error types for VaultSync core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in vault operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The vault container is not in a recognizable format.
    #[error("invalid vault format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The vault was written by an unsupported format version.
    #[error("unsupported vault version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the header.
        found: u16,
        /// Highest version this build understands.
        supported: u16,
    },

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Decryption failed (wrong master key or tampered ciphertext).
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Key derivation failed.
    #[error("key derivation failed: {message}")]
    KeyDerivationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Invalid key size.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// The decrypted body could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Entry not found.
    #[error("entry not found: {uuid}")]
    EntryNotFound {
        /// The entry id that was not found.
        uuid: uuid::Uuid,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an encryption failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a decryption failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a key derivation failed error.
    pub fn key_derivation_failed(message: impl Into<String>) -> Self {
        Self::KeyDerivationFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true if the error means the file's bytes cannot be trusted:
    /// authentication failed, or the container itself is damaged.
    ///
    /// A vault that fails this way was either written with a different
    /// master key or corrupted in transit.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            CoreError::DecryptionFailed { .. } | CoreError::InvalidFormat { .. }
        )
    }
}
