//! Remote filesystem capability.
//!
//! The engine talks to the remote side only through [`RemoteEndpoint`]. An
//! endpoint is built per attempt by the [`EndpointFactory`] registered for
//! the URL's protocol.

mod memory;
#[cfg(feature = "sftp")]
mod sftp;

pub use memory::{MemoryRemote, RemoteCall};
#[cfg(feature = "sftp")]
pub use sftp::{SftpEndpoint, SftpEndpointFactory};

use crate::config::{Credentials, Protocol, SyncConfig};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised by a [`RemoteEndpoint`].
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The session could not be established.
    #[error("connect error: {0}")]
    Connect(String),

    /// The remote rejected the login.
    #[error("authentication failed: {0}")]
    Credentials(String),

    /// A transfer or remote file operation failed.
    #[error("transfer error: {0}")]
    Transfer(String),

    /// The remote path does not exist.
    #[error("remote file not found: {0}")]
    NotFound(String),

    /// The operation needs a connected session.
    #[error("not connected")]
    NotConnected,

    /// Local I/O error while streaming.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RemoteError {
    /// Creates a transfer error.
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer(message.into())
    }

    /// Classifies this error as raised by `connect`.
    pub fn connect_failure(&self) -> ConnectFailure {
        match self {
            RemoteError::Credentials(_) => ConnectFailure::BadCredentials,
            other => classify_connect_failure(&other.to_string()),
        }
    }
}

/// Coarse class of a connect failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The cause points at the user name or password.
    BadCredentials,
    /// Anything else.
    Other,
}

/// Best-effort classification of a connect failure from its message.
///
/// Transports that report authentication failures only as text are
/// recognized by the message mentioning a user name or password. A miss
/// falls back to [`ConnectFailure::Other`].
pub fn classify_connect_failure(cause: &str) -> ConnectFailure {
    let cause = cause.to_ascii_lowercase();
    if cause.contains("username") || cause.contains("password") {
        ConnectFailure::BadCredentials
    } else {
        ConnectFailure::Other
    }
}

/// A stateful handle on a remote filesystem.
///
/// Paths are remote, `/`-separated strings. Every method except
/// [`connect`](Self::connect) and [`is_connected`](Self::is_connected)
/// requires a connected session.
pub trait RemoteEndpoint: Send {
    /// Opens the session.
    fn connect(&mut self) -> RemoteResult<()>;

    /// Returns true while the session is usable.
    fn is_connected(&self) -> bool;

    /// Returns true if `path` exists.
    fn exists(&mut self, path: &str) -> RemoteResult<bool>;

    /// Streams the file at `path` into `sink`.
    fn download(&mut self, path: &str, sink: &mut dyn Write) -> RemoteResult<()>;

    /// Creates or replaces the file at `path` with the bytes of `source`.
    fn upload(&mut self, source: &mut dyn Read, path: &str) -> RemoteResult<()>;

    /// Deletes the file at `path`.
    fn delete(&mut self, path: &str) -> RemoteResult<()>;

    /// Renames `from` to `to`. Fails if `to` exists.
    fn rename(&mut self, from: &str, to: &str) -> RemoteResult<()>;

    /// Closes the session. Safe to call when already disconnected.
    fn disconnect(&mut self);
}

/// Builds endpoints for one protocol.
pub trait EndpointFactory: Send + Sync {
    /// Creates an unconnected endpoint for `config`.
    fn create(&self, config: &SyncConfig, credentials: &Credentials) -> Box<dyn RemoteEndpoint>;
}

/// Endpoint factories keyed by protocol.
#[derive(Default)]
pub struct EndpointRegistry {
    factories: HashMap<Protocol, Box<dyn EndpointFactory>>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every protocol compiled into this build.
    pub fn standard() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "sftp")]
        registry.register(Protocol::Sftp, SftpEndpointFactory);
        registry
    }

    /// Registers (or replaces) the factory for `protocol`.
    pub fn register(&mut self, protocol: Protocol, factory: impl EndpointFactory + 'static) {
        self.factories.insert(protocol, Box::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, protocol: Protocol, factory: impl EndpointFactory + 'static) -> Self {
        self.register(protocol, factory);
        self
    }

    /// Factory for `protocol`, if registered.
    pub fn get(&self, protocol: Protocol) -> Option<&dyn EndpointFactory> {
        self.factories.get(&protocol).map(|f| f.as_ref())
    }

    /// Returns true if `protocol` has a factory.
    pub fn supports(&self, protocol: Protocol) -> bool {
        self.factories.contains_key(&protocol)
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("protocols", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_message() {
        assert_eq!(
            classify_connect_failure(
                "No suitable authentication method found to complete authentication \
                 (password,publickey)"
            ),
            ConnectFailure::BadCredentials
        );
        assert_eq!(
            classify_connect_failure("Invalid Username or Password"),
            ConnectFailure::BadCredentials
        );
        assert_eq!(
            classify_connect_failure("Connection timed out"),
            ConnectFailure::Other
        );
        assert_eq!(classify_connect_failure(""), ConnectFailure::Other);
    }

    #[test]
    fn structured_credentials_error() {
        assert_eq!(
            RemoteError::Credentials("nope".into()).connect_failure(),
            ConnectFailure::BadCredentials
        );
        assert_eq!(
            RemoteError::NotConnected.connect_failure(),
            ConnectFailure::Other
        );
    }

    #[test]
    fn registry_lookup() {
        let remote = MemoryRemote::new();
        let registry = EndpointRegistry::new().with(Protocol::Sftp, remote);
        assert!(registry.supports(Protocol::Sftp));
        assert!(registry.get(Protocol::Sftp).is_some());
        assert!(!EndpointRegistry::new().supports(Protocol::Sftp));
    }
}
