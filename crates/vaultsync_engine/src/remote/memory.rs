//! In-memory remote with fault injection.

use super::{EndpointFactory, RemoteEndpoint, RemoteError, RemoteResult};
use crate::config::{Credentials, SyncConfig};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// A call made against a [`MemoryRemote`], recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `connect()`.
    Connect,
    /// `exists(path)`.
    Exists(String),
    /// `download(path)`.
    Download(String),
    /// `upload(path)`.
    Upload(String),
    /// `delete(path)`.
    Delete(String),
    /// `rename(from, to)`.
    Rename(String, String),
    /// `disconnect()`.
    Disconnect,
}

#[derive(Debug, Default)]
struct Faults {
    connect_error: Option<String>,
    fail_exists: bool,
    fail_download_number: Option<usize>,
    fail_upload: bool,
    truncate_upload: bool,
    corrupt_upload: bool,
    fail_rename: bool,
    report_disconnected: bool,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    calls: Vec<RemoteCall>,
    connected: bool,
    downloads: usize,
    login: Option<(String, u16, String)>,
    presented: Option<(String, String)>,
    accepted: Option<(String, String)>,
    faults: Faults,
}

/// A remote filesystem held in memory.
///
/// Clones share state, so a test can keep one handle while the engine
/// drives another obtained through the factory impl.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a file.
    pub fn put_file(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.state.lock().files.insert(path.into(), data.into());
    }

    /// Returns a copy of a file's contents.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    /// Returns true if `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().files.contains_key(path)
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Host, port and user name of the last endpoint built by the factory.
    pub fn last_login(&self) -> Option<(String, u16, String)> {
        self.state.lock().login.clone()
    }

    /// Only accept this user name and password on connect.
    pub fn require_login(&self, username: impl Into<String>, password: impl Into<String>) {
        self.state.lock().accepted = Some((username.into(), password.into()));
    }

    /// Make `connect` fail with `message`.
    pub fn fail_connect(&self, message: impl Into<String>) {
        self.state.lock().faults.connect_error = Some(message.into());
    }

    /// Make every `exists` check fail.
    pub fn fail_exists(&self, fail: bool) {
        self.state.lock().faults.fail_exists = fail;
    }

    /// Make the `n`th download (1-based, counted across the remote's
    /// lifetime) fail.
    pub fn fail_download_number(&self, n: usize) {
        self.state.lock().faults.fail_download_number = Some(n);
    }

    /// Make every upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.state.lock().faults.fail_upload = fail;
    }

    /// Store uploads one byte short.
    pub fn truncate_uploads(&self, truncate: bool) {
        self.state.lock().faults.truncate_upload = truncate;
    }

    /// Flip the last bit of every upload.
    pub fn corrupt_uploads(&self, corrupt: bool) {
        self.state.lock().faults.corrupt_upload = corrupt;
    }

    /// Make every rename fail.
    pub fn fail_renames(&self, fail: bool) {
        self.state.lock().faults.fail_rename = fail;
    }

    /// Make `is_connected` report false while calls keep working.
    pub fn report_disconnected(&self, lost: bool) {
        self.state.lock().faults.report_disconnected = lost;
    }

    /// Clears every injected fault.
    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    fn ensure_connected(state: &State) -> RemoteResult<()> {
        if state.connected {
            Ok(())
        } else {
            Err(RemoteError::NotConnected)
        }
    }
}

impl RemoteEndpoint for MemoryRemote {
    fn connect(&mut self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Connect);

        if let Some(message) = &state.faults.connect_error {
            return Err(RemoteError::Connect(message.clone()));
        }

        if let Some(accepted) = &state.accepted {
            if state.presented.as_ref() != Some(accepted) {
                let user = state
                    .presented
                    .as_ref()
                    .map(|(user, _)| user.clone())
                    .unwrap_or_default();
                return Err(RemoteError::Credentials(format!("login refused for {user}")));
            }
        }

        state.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.connected && !state.faults.report_disconnected
    }

    fn exists(&mut self, path: &str) -> RemoteResult<bool> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Exists(path.to_string()));
        Self::ensure_connected(&state)?;
        if state.faults.fail_exists {
            return Err(RemoteError::transfer(format!("injected failure checking {path}")));
        }
        Ok(state.files.contains_key(path))
    }

    fn download(&mut self, path: &str, sink: &mut dyn Write) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Download(path.to_string()));
        Self::ensure_connected(&state)?;

        state.downloads += 1;
        if state.faults.fail_download_number == Some(state.downloads) {
            return Err(RemoteError::transfer(format!("injected failure downloading {path}")));
        }

        let data = state
            .files
            .get(path)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))?;
        sink.write_all(data)?;
        sink.flush()?;
        Ok(())
    }

    fn upload(&mut self, source: &mut dyn Read, path: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Upload(path.to_string()));
        Self::ensure_connected(&state)?;

        if state.faults.fail_upload {
            return Err(RemoteError::transfer(format!("injected failure uploading {path}")));
        }

        let mut data = Vec::new();
        source.read_to_end(&mut data)?;

        if state.faults.truncate_upload {
            data.pop();
        }
        if state.faults.corrupt_upload {
            if let Some(last) = data.last_mut() {
                *last ^= 0x01;
            }
        }

        state.files.insert(path.to_string(), data);
        Ok(())
    }

    fn delete(&mut self, path: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Delete(path.to_string()));
        Self::ensure_connected(&state)?;
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    fn rename(&mut self, from: &str, to: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(RemoteCall::Rename(from.to_string(), to.to_string()));
        Self::ensure_connected(&state)?;

        if state.faults.fail_rename {
            return Err(RemoteError::transfer(format!("injected failure renaming {from}")));
        }
        if state.files.contains_key(to) {
            return Err(RemoteError::transfer(format!("{to} already exists")));
        }

        let data = state
            .files
            .remove(from)
            .ok_or_else(|| RemoteError::NotFound(from.to_string()))?;
        state.files.insert(to.to_string(), data);
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::Disconnect);
        state.connected = false;
    }
}

impl EndpointFactory for MemoryRemote {
    fn create(&self, config: &SyncConfig, credentials: &Credentials) -> Box<dyn RemoteEndpoint> {
        {
            let mut state = self.state.lock();
            state.login = Some((
                config.host.clone(),
                config.port,
                credentials.username().to_string(),
            ));
            state.presented = Some((
                credentials.username().to_string(),
                credentials.password().to_string(),
            ));
        }
        Box::new(self.clone())
    }
}
