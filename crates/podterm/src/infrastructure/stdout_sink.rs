//! Render sink that writes remote output to the local terminal.
//!
//! The remote side runs a real pty, so its output already contains carriage
//! returns and escape sequences.  The bytes are written through untouched and
//! flushed per frame so interactive echo is not held back by buffering.

use std::io::{self, Write};

use podterm_core::{Frame, Operation, Sink};
use tracing::warn;

/// Writes the `data` of every `stdout` frame to `W`.
pub struct TerminalWriter<W: Write> {
    out: W,
    write_failed: bool,
}

impl TerminalWriter<io::Stdout> {
    /// A writer on the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            write_failed: false,
        }
    }

    /// Consumes the writer, returning the underlying output.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink<Frame> for TerminalWriter<W> {
    fn deliver(&mut self, frame: &Frame) {
        if frame.operation != Operation::Stdout {
            return;
        }
        let Some(data) = frame.data.as_deref() else {
            return;
        };

        let result = self
            .out
            .write_all(data.as_bytes())
            .and_then(|()| self.out.flush());

        // Only the first failure is logged; a closed stdout fails every write.
        if let Err(e) = result {
            if !self.write_failed {
                warn!("failed to write terminal output: {e}");
                self.write_failed = true;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
