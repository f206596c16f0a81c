//! Input and resize coalescing.
//!
//! Keystrokes and window resizes arrive at very different rates and need
//! different treatment:
//!
//! - **Keystrokes** go out immediately as `stdin` frames.  Interactive latency
//!   matters more than packet count.
//! - **Resizes** are debounced.  Dragging a window edge produces dozens of
//!   events per second; only the last one observed before a quiet period of
//!   `window` (1 s by default) becomes a `resize` frame.
//!
//! Every `stdin` frame carries the geometry the remote was last told about, so
//! the remote pty stays in sync even if a `resize` frame was lost.
//!
//! The coalescer owns no timer.  Callers pass the current [`Instant`] in, ask
//! [`Coalescer::next_deadline`] when to wake up, and call [`Coalescer::poll`]
//! when that moment arrives.  "Cancelling the timer" is simply forgetting the
//! pending resize.

use std::time::{Duration, Instant};

use crate::protocol::frame::{Frame, Geometry};

/// Default quiescence window before a resize is sent.
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy)]
struct PendingResize {
    geometry: Geometry,
    deadline: Instant,
}

/// Turns local input events into outbound frames.
#[derive(Debug, Clone)]
pub struct Coalescer {
    geometry: Geometry,
    window: Duration,
    pending: Option<PendingResize>,
}

impl Coalescer {
    /// Creates a coalescer that assumes `initial` as the current geometry.
    pub fn new(initial: Geometry, window: Duration) -> Self {
        Self {
            geometry: initial,
            window,
            pending: None,
        }
    }

    /// The geometry most recently applied (and stamped on `stdin` frames).
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// The debounce window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Builds the `stdin` frame for one keystroke (or pasted chunk).
    pub fn keystroke(&self, data: impl Into<String>) -> Frame {
        Frame::stdin(data, self.geometry)
    }

    /// The resize frame sent once when the channel opens, fitting the remote
    /// to the local terminal before any input is meaningful.
    pub fn initial_resize(&self) -> Frame {
        Frame::resize(self.geometry)
    }

    /// Records a local resize and (re)starts the quiescence window.
    ///
    /// A later call within the window supersedes this one.
    pub fn observe_resize(&mut self, geometry: Geometry, now: Instant) {
        self.pending = Some(PendingResize {
            geometry,
            deadline: now + self.window,
        });
    }

    /// Emits the pending resize once its window has elapsed.
    ///
    /// Returns `None` before the deadline, when nothing is pending, or when the
    /// settled geometry equals the one already applied.
    pub fn poll(&mut self, now: Instant) -> Option<Frame> {
        let pending = self.pending?;
        if now < pending.deadline {
            return None;
        }
        self.pending = None;

        if pending.geometry == self.geometry {
            return None;
        }
        self.geometry = pending.geometry;
        Some(Frame::resize(pending.geometry))
    }

    /// When the caller should next call [`poll`](Self::poll).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// `true` while a resize is waiting for its window to elapse.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops any pending resize.  Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

impl Default for Coalescer {
    fn default() -> Self {
        Self::new(Geometry::DEFAULT, DEFAULT_RESIZE_DEBOUNCE)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
