//! Turning result codes into what the user sees.

use crate::result::SyncResultCode;

/// Where status lines and error dialogs go.
pub trait StatusSink {
    /// Replaces the status line.
    fn set_status(&mut self, text: &str);

    /// Shows a blocking error message. Only used for attended attempts.
    fn show_error(&mut self, title: &str, message: &str);
}

const MSG_INVALID_URL: &str = "The URL is invalid.";
const MSG_INVALID_LOGIN: &str = "The user name or password is invalid.";
const MSG_FILE_NOT_FOUND: &str = "The remote path could not be found.";
const MSG_UNKNOWN: &str = "An unknown error occurred.";

/// Reports attempt outcomes under an application name.
#[derive(Debug, Clone)]
pub struct ResultReporter {
    name: String,
}

impl ResultReporter {
    /// Creates a reporter that prefixes lines with `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// `"<name>: <text>"`.
    pub fn status(&self, text: &str) -> String {
        format!("{}: {}", self.name, text)
    }

    /// Status line shown while an attempt runs.
    pub fn synchronizing(&self) -> String {
        self.status("Synchronizing...")
    }

    /// Status line for a terminal code.
    pub fn status_line(&self, code: SyncResultCode) -> String {
        if code.is_success() {
            self.status("sync succeeded")
        } else {
            self.status("sync failed")
        }
    }

    /// Title of the error dialog.
    pub fn error_title(&self) -> String {
        self.status("sync failed")
    }

    /// Dialog text for a failure code, `None` for success.
    ///
    /// URL problems share one message regardless of which part is wrong.
    pub fn error_message(code: SyncResultCode) -> Option<&'static str> {
        match code {
            SyncResultCode::Success => None,
            SyncResultCode::InvalidParameters
            | SyncResultCode::InvalidProtocol
            | SyncResultCode::InvalidHost
            | SyncResultCode::InvalidPort => Some(MSG_INVALID_URL),
            SyncResultCode::InvalidCredentials => Some(MSG_INVALID_LOGIN),
            SyncResultCode::InvalidPath => Some(MSG_FILE_NOT_FOUND),
            SyncResultCode::UnknownError
            | SyncResultCode::ConnectFailed
            | SyncResultCode::DownloadFailed
            | SyncResultCode::UploadFailed
            | SyncResultCode::MergeFailed => Some(MSG_UNKNOWN),
        }
    }

    /// Reports `code`: always a status line, plus a dialog when attended.
    pub fn report(&self, code: SyncResultCode, attended: bool, sink: &mut dyn StatusSink) {
        sink.set_status(&self.status_line(code));
        if !attended {
            return;
        }
        if let Some(message) = Self::error_message(code) {
            sink.show_error(&self.error_title(), message);
        }
    }
}
