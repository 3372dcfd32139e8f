//! Terminal status output and prompts.

use std::io::{self, BufRead, IsTerminal, Write};
use vaultsync_engine::{CorruptionNotice, OverridePrompt, StatusSink};

/// Returns true when someone is at the terminal to answer prompts.
pub fn interactive() -> bool {
    io::stdin().is_terminal()
}

/// Prints status lines to stdout and errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn set_status(&mut self, text: &str) {
        println!("{text}");
    }

    fn show_error(&mut self, title: &str, message: &str) {
        eprintln!("{title}\n  {message}");
    }
}

/// Asks on the terminal before overwriting a corrupted remote copy.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stdin / stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    /// Prompt reading answers from `input` and writing questions to `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, notice: &CorruptionNotice) -> io::Result<bool> {
        writeln!(self.output, "{}", CorruptionNotice::TITLE)?;
        writeln!(self.output, "{}", notice.message())?;
        write!(self.output, "Overwrite the remote copy? [y/N] ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

impl<R: BufRead, W: Write> OverridePrompt for TerminalPrompt<R, W> {
    fn confirm_override(&mut self, notice: &CorruptionNotice) -> bool {
        // No answer means no.
        self.ask(notice).unwrap_or(false)
    }
}
