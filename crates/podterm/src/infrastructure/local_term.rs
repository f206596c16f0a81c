//! The local side of the bridge: the TTY podterm runs in.
//!
//! - [`RawModeGuard`] puts the terminal in raw mode and restores it on drop,
//!   including when the session ends with an error.
//! - [`spawn_input_reader`] reads stdin on a dedicated OS thread.  A blocking
//!   thread is used rather than `tokio::io::stdin` because an interactive read
//!   never completes on its own and would keep the runtime from shutting down.
//! - [`ResizeWatcher`] turns `SIGWINCH` into fresh [`Geometry`] values.
//! - [`InputDecoder`] and [`split_at_detach`] turn raw input bytes into the
//!   text sent as `stdin` frames.

use std::io::{self, Read};
use std::thread;

use crossterm::terminal;
use podterm_core::Geometry;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Holds the terminal in raw mode for as long as it lives.
#[derive(Debug)]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Switches the terminal to raw mode.
    ///
    /// # Errors
    ///
    /// Fails when stdin is not a terminal.
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        debug!("raw mode enabled");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("failed to restore terminal mode: {e}");
        }
    }
}

/// Current size of the local terminal, or 24x80 if it cannot be read.
pub fn terminal_geometry() -> Geometry {
    match terminal::size() {
        Ok((cols, rows)) => Geometry::new(rows, cols).unwrap_or_default(),
        Err(e) => {
            debug!("terminal size unavailable ({e}); assuming {}", Geometry::DEFAULT);
            Geometry::DEFAULT
        }
    }
}

/// Reads stdin on a dedicated thread, forwarding each chunk to `tx`.
///
/// The thread exits when stdin reaches EOF or the receiver is dropped.  The
/// channel closing is the caller's EOF signal.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_input_reader(tx: mpsc::Sender<Vec<u8>>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("podterm-stdin".to_string())
        .spawn(move || {
            let mut stdin = io::stdin().lock();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => {
                        debug!("stdin reached EOF");
                        break;
                    }
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        })
}

/// Yields the new terminal geometry each time the window is resized.
pub struct ResizeWatcher {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
}

impl ResizeWatcher {
    /// Registers for window-change notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed.
    #[cfg(unix)]
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            signal: signal(SignalKind::window_change())?,
        })
    }

    /// No window-change signal exists off Unix; the watcher never fires.
    #[cfg(not(unix))]
    pub fn new() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next resize.  `None` once the signal stream ends.
    #[cfg(unix)]
    pub async fn next(&mut self) -> Option<Geometry> {
        self.signal.recv().await?;
        Some(terminal_geometry())
    }

    #[cfg(not(unix))]
    pub async fn next(&mut self) -> Option<Geometry> {
        std::future::pending().await
    }
}

/// Splits `chunk` at the first detach byte.
///
/// Returns the bytes before it and whether the detach key was pressed.  The
/// detach byte and anything after it are never sent.
pub fn split_at_detach(chunk: &[u8], detach_key: Option<u8>) -> (&[u8], bool) {
    let Some(key) = detach_key else {
        return (chunk, false);
    };
    match chunk.iter().position(|&b| b == key) {
        Some(pos) => (&chunk[..pos], true),
        None => (chunk, false),
    }
}

/// Turns a stream of raw input chunks into UTF-8 text.
///
/// A multi-byte character split across two reads is held back until its
/// remaining bytes arrive.  Bytes that can never be valid UTF-8 become
/// U+FFFD.
#[derive(Debug, Default)]
pub struct InputDecoder {
    pending: Vec<u8>,
}

impl InputDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + chunk` as is complete.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more.
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
