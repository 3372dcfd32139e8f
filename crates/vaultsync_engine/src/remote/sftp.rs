//! SFTP endpoint over libssh2.

use super::{EndpointFactory, RemoteEndpoint, RemoteError, RemoteResult};
use crate::config::{Credentials, SyncConfig};
use ssh2::{ErrorCode, Session, Sftp};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use tracing::debug;

/// libssh2 status for a missing remote file.
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Session timeout for blocking calls, in milliseconds.
const SESSION_TIMEOUT_MS: u32 = 30_000;

/// Password-authenticated SFTP session.
pub struct SftpEndpoint {
    host: String,
    port: u16,
    credentials: Credentials,
    session: Option<Session>,
    sftp: Option<Sftp>,
}

impl SftpEndpoint {
    /// Creates an unconnected endpoint.
    pub fn new(host: impl Into<String>, port: u16, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
            session: None,
            sftp: None,
        }
    }

    fn sftp(&self) -> RemoteResult<&Sftp> {
        self.sftp.as_ref().ok_or(RemoteError::NotConnected)
    }
}

fn transfer(e: ssh2::Error) -> RemoteError {
    RemoteError::transfer(e.to_string())
}

impl RemoteEndpoint for SftpEndpoint {
    fn connect(&mut self) -> RemoteResult<()> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| RemoteError::Connect(format!("{}:{}: {e}", self.host, self.port)))?;

        let mut session = Session::new().map_err(|e| RemoteError::Connect(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(SESSION_TIMEOUT_MS);
        session
            .handshake()
            .map_err(|e| RemoteError::Connect(e.to_string()))?;

        session
            .userauth_password(self.credentials.username(), self.credentials.password())
            .map_err(|e| RemoteError::Credentials(e.to_string()))?;
        if !session.authenticated() {
            return Err(RemoteError::Credentials(format!(
                "password authentication refused for {}",
                self.credentials.username()
            )));
        }

        let sftp = session
            .sftp()
            .map_err(|e| RemoteError::Connect(e.to_string()))?;

        debug!(host = %self.host, port = self.port, "sftp session established");
        self.session = Some(session);
        self.sftp = Some(sftp);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        let (Some(session), Some(sftp)) = (&self.session, &self.sftp) else {
            return false;
        };
        // Round-trip on the channel so a dropped socket shows up here.
        match sftp.realpath(Path::new(".")) {
            Ok(_) => session.authenticated(),
            Err(e) => {
                debug!(host = %self.host, error = %e, "sftp session is gone");
                false
            }
        }
    }

    fn exists(&mut self, path: &str) -> RemoteResult<bool> {
        match self.sftp()?.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Ok(false),
            Err(e) => Err(transfer(e)),
        }
    }

    fn download(&mut self, path: &str, sink: &mut dyn Write) -> RemoteResult<()> {
        let mut file = self.sftp()?.open(Path::new(path)).map_err(|e| {
            if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) {
                RemoteError::NotFound(path.to_string())
            } else {
                transfer(e)
            }
        })?;
        io::copy(&mut file, sink)?;
        sink.flush()?;
        Ok(())
    }

    fn upload(&mut self, source: &mut dyn Read, path: &str) -> RemoteResult<()> {
        let mut file = self.sftp()?.create(Path::new(path)).map_err(transfer)?;
        io::copy(source, &mut file)?;
        file.flush()?;
        Ok(())
    }

    fn delete(&mut self, path: &str) -> RemoteResult<()> {
        self.sftp()?.unlink(Path::new(path)).map_err(transfer)
    }

    fn rename(&mut self, from: &str, to: &str) -> RemoteResult<()> {
        self.sftp()?
            .rename(Path::new(from), Path::new(to), None)
            .map_err(transfer)
    }

    fn disconnect(&mut self) {
        self.sftp = None;
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "sync finished", None) {
                debug!(error = %e, "sftp disconnect failed");
            }
        }
    }
}

/// Factory for [`SftpEndpoint`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SftpEndpointFactory;

impl EndpointFactory for SftpEndpointFactory {
    fn create(&self, config: &SyncConfig, credentials: &Credentials) -> Box<dyn RemoteEndpoint> {
        Box::new(SftpEndpoint::new(
            config.host.clone(),
            config.port,
            credentials.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn endpoint(port: u16) -> SftpEndpoint {
        SftpEndpoint::new("127.0.0.1", port, Credentials::new("alice", "pw"))
    }

    #[test]
    fn unconnected_endpoint_is_not_connected() {
        let mut endpoint = endpoint(22);
        assert!(!endpoint.is_connected());
        assert!(matches!(endpoint.exists("/x"), Err(RemoteError::NotConnected)));
        endpoint.disconnect();
        assert!(!endpoint.is_connected());
    }

    #[test]
    fn refused_connection_is_a_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut endpoint = endpoint(port);
        assert!(matches!(endpoint.connect(), Err(RemoteError::Connect(_))));
        assert!(!endpoint.is_connected());
    }

    #[test]
    fn peer_hanging_up_during_handshake_leaves_no_session() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            // Accept and hang up without speaking SSH.
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut endpoint = endpoint(port);
        assert!(matches!(endpoint.connect(), Err(RemoteError::Connect(_))));
        assert!(!endpoint.is_connected());
        server.join().unwrap();
    }
}
