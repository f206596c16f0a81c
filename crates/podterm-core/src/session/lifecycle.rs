//! The lifecycle controller for one bridge instance.
//!
//! A [`TerminalBridge`] binds one [`SessionTarget`] to one render sink.  It
//! owns the [`SessionChannel`], the [`ReplayBuffer`] and the [`Coalescer`];
//! all three are created together and torn down together.
//!
//! ```text
//!        attach()          Opened            teardown() / channel error
//! Idle ──────────▶ Attaching ──────▶ Active ───────────────────────────▶ TornDown
//!                      │                                                    ▲
//!                      └──────────── open failure / handshake error ────────┘
//! ```
//!
//! Teardown runs in a fixed order:
//!
//! 1. stop accepting input,
//! 2. unsubscribe the render sink from the replay buffer,
//! 3. close the channel (clears its consumer, releases the transport),
//! 4. cancel the pending resize.
//!
//! After step 2 the sink is never called again; after step 3 nothing is sent.
//!
//! The target never changes under a live instance.  [`TerminalBridge::retarget`]
//! consumes the old instance, tears it down with
//! [`TeardownReason::TargetChanged`] and builds a fresh one, so frames from the
//! old channel cannot reach the new buffer.
//!
//! There is no automatic reconnect: once torn down, an instance stays torn
//! down.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::coalescer::{Coalescer, DEFAULT_RESIZE_DEBOUNCE};
use crate::domain::replay::{BoxedSink, ReplayBuffer, SinkId, DEFAULT_REPLAY_CAPACITY};
use crate::domain::target::{Endpoint, EndpointError, SessionTarget};
use crate::protocol::frame::{Frame, Geometry, Operation};
use crate::session::channel::{
    ChannelEvent, ChannelState, Connector, SendError, SessionChannel, Transport, TransportError,
};

/// The component that draws remote output.
pub type RenderSink = BoxedSink<Frame>;

/// Host callback invoked when the user picks a container tab.
pub type ContainerCallback = Box<dyn FnMut(&SessionTarget, &str) + Send>;

/// Lifecycle state of a [`TerminalBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Attaching,
    Active,
    TornDown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Attaching => "attaching",
            LifecycleState::Active => "active",
            LifecycleState::TornDown => "torn down",
        };
        f.write_str(s)
    }
}

/// Why an instance was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownReason {
    /// The host unmounted the terminal (user detached or quit).
    Unmount,
    /// The host switched to a different target.
    TargetChanged,
    /// The channel failed or was closed by the remote.
    ChannelClosed(TransportError),
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownReason::Unmount => f.write_str("detached"),
            TeardownReason::TargetChanged => f.write_str("target changed"),
            TeardownReason::ChannelClosed(e) => write!(f, "disconnected: {e}"),
        }
    }
}

/// Errors from building or attaching a bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The target's endpoint could not be derived from the origin.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// `attach` was called on an instance that is not `Idle`.
    #[error("bridge cannot attach in state {0}")]
    NotIdle(LifecycleState),

    /// The connection could not be started.  The bridge is now torn down.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Tunables for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Dashboard origin, e.g. `https://cyclops.example.com`.
    pub origin: String,
    /// Frames kept for late-attaching sinks.
    pub replay_capacity: usize,
    /// Quiescence window before a resize is sent.
    pub resize_debounce: Duration,
    /// Geometry assumed until the first resize settles.
    pub initial_geometry: Geometry,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".to_string(),
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            initial_geometry: Geometry::DEFAULT,
        }
    }
}

/// One terminal session against one target.
pub struct TerminalBridge<T: Transport> {
    instance_id: Uuid,
    target: SessionTarget,
    endpoint: Endpoint,
    settings: BridgeSettings,
    state: LifecycleState,
    channel: Option<SessionChannel<T>>,
    replay: Arc<Mutex<ReplayBuffer<Frame>>>,
    coalescer: Coalescer,
    /// Sink handed to `attach`, held until the channel opens.
    pending_sink: Option<RenderSink>,
    sink_id: Option<SinkId>,
    input_enabled: bool,
    teardown_reason: Option<TeardownReason>,
    on_container_selected: Option<ContainerCallback>,
}

impl<T: Transport> TerminalBridge<T> {
    /// Creates an `Idle` instance for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Endpoint`] if `settings.origin` cannot be turned
    /// into a socket URL.
    pub fn new(target: SessionTarget, settings: BridgeSettings) -> Result<Self, BridgeError> {
        let endpoint = Endpoint::for_target(&settings.origin, &target)?;
        let replay = ReplayBuffer::with_capacity(settings.replay_capacity);
        let coalescer = Coalescer::new(settings.initial_geometry, settings.resize_debounce);
        let instance_id = Uuid::new_v4();
        debug!(instance = %instance_id, session = %target, "bridge created");

        Ok(Self {
            instance_id,
            target,
            endpoint,
            settings,
            state: LifecycleState::Idle,
            channel: None,
            replay: Arc::new(Mutex::new(replay)),
            coalescer,
            pending_sink: None,
            sink_id: None,
            input_enabled: false,
            teardown_reason: None,
            on_container_selected: None,
        })
    }

    /// Registers the callback run by [`select_container`](Self::select_container).
    #[must_use]
    pub fn with_container_callback(mut self, callback: ContainerCallback) -> Self {
        self.on_container_selected = Some(callback);
        self
    }

    /// Starts the session: `Idle → Attaching`.
    ///
    /// The sink is subscribed once the channel reports it is open.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::NotIdle`] if this instance was already attached.  The
    ///   sink is dropped.
    /// - [`BridgeError::Transport`] if the connection could not be started.
    ///   The instance is torn down with [`TeardownReason::ChannelClosed`].
    pub fn attach<C>(&mut self, connector: &mut C, sink: RenderSink) -> Result<(), BridgeError>
    where
        C: Connector<Transport = T>,
    {
        if self.state != LifecycleState::Idle {
            return Err(BridgeError::NotIdle(self.state));
        }

        self.state = LifecycleState::Attaching;
        self.pending_sink = Some(sink);
        info!(instance = %self.instance_id, session = %self.target, "attaching");

        let mut channel = SessionChannel::new(self.endpoint.clone());
        let replay = Arc::clone(&self.replay);
        channel.on_frame(Box::new(move |frame: Frame| {
            if frame.operation == Operation::Stdout {
                lock(&replay).push(frame);
            } else {
                debug!("ignoring inbound {} frame", frame.operation);
            }
        }));

        let opened = channel.open(connector);
        self.channel = Some(channel);

        if let Err(e) = opened {
            self.end(TeardownReason::ChannelClosed(e.clone()));
            return Err(BridgeError::Transport(e));
        }
        Ok(())
    }

    /// Feeds one transport event through the channel.
    ///
    /// Returns the teardown reason when this event ended the session.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) -> Option<TeardownReason> {
        let Some(channel) = self.channel.as_mut() else {
            debug!("no channel; ignoring {event:?}");
            return None;
        };

        let fatal = channel.handle_event(event);
        let now_open = channel.is_open();

        if let Some(err) = fatal {
            let reason = TeardownReason::ChannelClosed(err);
            self.end(reason.clone());
            return Some(reason);
        }

        if now_open && self.state == LifecycleState::Attaching {
            self.activate();
            if self.state == LifecycleState::TornDown {
                return self.teardown_reason.clone();
            }
        }
        None
    }

    /// Sends one keystroke (or pasted chunk) as a `stdin` frame.
    ///
    /// # Errors
    ///
    /// [`SendError::NotConnected`] unless the session is `Active`;
    /// [`SendError::Transport`] if the write failed, which also tears the
    /// session down.
    pub fn send_input(&mut self, data: &str) -> Result<(), SendError> {
        if !self.input_enabled {
            return Err(SendError::NotConnected {
                state: self.channel_state(),
            });
        }
        let frame = self.coalescer.keystroke(data);
        self.dispatch(&frame)
    }

    /// Records a local terminal resize.  The frame goes out after the
    /// debounce window via [`poll_timers`](Self::poll_timers).
    pub fn observe_resize(&mut self, geometry: Geometry, now: Instant) {
        if self.state == LifecycleState::TornDown {
            return;
        }
        debug!(instance = %self.instance_id, %geometry, "resize observed");
        self.coalescer.observe_resize(geometry, now);
    }

    /// Fires the debounce timer if it is due.
    ///
    /// A settled resize is always adopted as the current geometry, but is
    /// only sent while `Active`; before that the initial resize on open
    /// carries it.
    ///
    /// # Errors
    ///
    /// Propagates a transport failure from sending the resize frame.
    pub fn poll_timers(&mut self, now: Instant) -> Result<(), SendError> {
        if self.state == LifecycleState::TornDown {
            return Ok(());
        }
        let Some(frame) = self.coalescer.poll(now) else {
            return Ok(());
        };
        if self.state == LifecycleState::Active {
            self.dispatch(&frame)
        } else {
            debug!("resize settled before open; deferring to initial fit");
            Ok(())
        }
    }

    /// When [`poll_timers`](Self::poll_timers) should next be called.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.state == LifecycleState::TornDown {
            return None;
        }
        self.coalescer.next_deadline()
    }

    /// Ends the session and hands back the render sink.
    ///
    /// Idempotent: a second call keeps the first reason.  When the session
    /// ended on its own (channel failure, remote close, refused connection)
    /// the sink is held until this is called, so the host can still reclaim
    /// it; otherwise a second call returns `None`.
    pub fn teardown(&mut self, reason: TeardownReason) -> Option<RenderSink> {
        if self.state == LifecycleState::TornDown {
            return self.pending_sink.take();
        }

        self.input_enabled = false;

        let sink = match self.sink_id.take() {
            Some(id) => lock(&self.replay).unsubscribe(id),
            None => self.pending_sink.take(),
        };

        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }

        self.coalescer.cancel();
        self.state = LifecycleState::TornDown;

        match &reason {
            TeardownReason::ChannelClosed(e) => {
                warn!(instance = %self.instance_id, session = %self.target, "session ended: {e}");
            }
            other => {
                info!(instance = %self.instance_id, session = %self.target, "session ended: {other}");
            }
        }
        self.teardown_reason = Some(reason);
        sink
    }

    /// Moves the session to a new target.
    ///
    /// Tears this instance down with [`TeardownReason::TargetChanged`], then
    /// builds and attaches a new instance with the reclaimed sink, the same
    /// settings and the same container callback.  This works from any state,
    /// including after the old session ended on a channel error.
    ///
    /// A connection that cannot be started is not an error here: the
    /// returned instance is already torn down with
    /// [`TeardownReason::ChannelClosed`] and still holds the sink, so a later
    /// `retarget` or `teardown` gets it back.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Endpoint`] if the new target has no valid
    /// endpoint.  The old instance is torn down and its sink dropped.
    pub fn retarget<C>(mut self, target: SessionTarget, connector: &mut C) -> Result<Self, BridgeError>
    where
        C: Connector<Transport = T>,
    {
        info!(instance = %self.instance_id, from = %self.target, to = %target, "retargeting");
        let sink = self.teardown(TeardownReason::TargetChanged);

        let mut next = TerminalBridge::new(target, self.settings.clone())?;
        next.on_container_selected = self.on_container_selected.take();
        if let Some(sink) = sink {
            match next.attach(connector, sink) {
                Ok(()) | Err(BridgeError::Transport(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(next)
    }

    /// Reports a container-tab selection to the host.  The bridge itself does
    /// not retarget; the host decides whether to call
    /// [`retarget`](Self::retarget).
    pub fn select_container(&mut self, container_name: &str) {
        match self.on_container_selected.as_mut() {
            Some(callback) => callback(&self.target, container_name),
            None => debug!("container {container_name} selected with no callback"),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────────

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel
            .as_ref()
            .map_or(ChannelState::Disconnected, SessionChannel::state)
    }

    pub fn teardown_reason(&self) -> Option<&TeardownReason> {
        self.teardown_reason.as_ref()
    }

    /// Unique id of this instance, for log correlation.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Geometry currently stamped on `stdin` frames.
    pub fn geometry(&self) -> Geometry {
        self.coalescer.geometry()
    }

    /// Whether `send_input` is currently accepted.
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Number of frames held in the replay buffer.
    pub fn buffered_frames(&self) -> usize {
        lock(&self.replay).len()
    }

    // ── Internals ──────────────────────────────────────────────────────────────

    /// Teardown the host did not ask for.  The sink stays parked until the
    /// host calls [`teardown`](Self::teardown) or [`retarget`](Self::retarget).
    fn end(&mut self, reason: TeardownReason) {
        self.pending_sink = self.teardown(reason);
    }

    /// `Attaching → Active`: subscribe the sink, fit the remote, open input.
    fn activate(&mut self) {
        self.state = LifecycleState::Active;
        info!(instance = %self.instance_id, session = %self.target, "session active");

        if let Some(sink) = self.pending_sink.take() {
            self.sink_id = Some(lock(&self.replay).subscribe(sink));
        }

        let fit = self.coalescer.initial_resize();
        if self.dispatch(&fit).is_err() {
            return;
        }
        self.input_enabled = true;
    }

    /// Sends through the channel, tearing down on a transport failure.
    fn dispatch(&mut self, frame: &Frame) -> Result<(), SendError> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(SendError::NotConnected {
                state: ChannelState::Disconnected,
            });
        };
        let result = channel.send(frame);
        if let Err(SendError::Transport(e)) = &result {
            self.end(TeardownReason::ChannelClosed(e.clone()));
        }
        result
    }
}

impl<T: Transport> Drop for TerminalBridge<T> {
    fn drop(&mut self) {
        self.teardown(TeardownReason::Unmount);
    }
}

impl<T: Transport> fmt::Debug for TerminalBridge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalBridge")
            .field("instance_id", &self.instance_id)
            .field("target", &self.target)
            .field("state", &self.state)
            .field("channel", &self.channel_state())
            .field("geometry", &self.coalescer.geometry())
            .finish()
    }
}

/// A poisoned lock only means a sink panicked mid-delivery; the buffer itself
/// is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::{MockConnector, MockRenderSink, MockTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn target() -> SessionTarget {
        SessionTarget::new("api", "default", "demo", "main")
    }

    fn geo(rows: u16, cols: u16) -> Geometry {
        Geometry::new(rows, cols).unwrap()
    }

    fn bridge() -> TerminalBridge<MockTransport> {
        TerminalBridge::new(target(), BridgeSettings::default()).unwrap()
    }

    fn stdout_event(data: &str) -> ChannelEvent {
        ChannelEvent::Message(
            format!(r#"{{"operation":"stdout","data":"{data}"}}"#).into_bytes(),
        )
    }

    /// Bridge attached and opened; returns the connector and the sink.
    fn active() -> (TerminalBridge<MockTransport>, MockConnector, MockRenderSink) {
        let mut b = bridge();
        let mut connector = MockConnector::new();
        let sink = MockRenderSink::new();
        b.attach(&mut connector, sink.boxed()).unwrap();
        b.handle_channel_event(ChannelEvent::Opened);
        (b, connector, sink)
    }

    #[test]
    fn test_new_bridge_is_idle() {
        let b = bridge();
        assert_eq!(b.state(), LifecycleState::Idle);
        assert_eq!(b.channel_state(), ChannelState::Disconnected);
        assert!(b.teardown_reason().is_none());
    }

    #[test]
    fn test_bad_origin_is_rejected_at_construction() {
        let settings = BridgeSettings {
            origin: "ftp://nowhere".to_string(),
            ..BridgeSettings::default()
        };
        let result: Result<TerminalBridge<MockTransport>, _> =
            TerminalBridge::new(target(), settings);
        assert!(matches!(result, Err(BridgeError::Endpoint(_))));
    }

    #[test]
    fn test_attach_moves_to_attaching_and_opens_one_connection() {
        // Arrange
        let mut b = bridge();
        let mut connector = MockConnector::new();

        // Act
        b.attach(&mut connector, MockRenderSink::new().boxed())
            .unwrap();

        // Assert
        assert_eq!(b.state(), LifecycleState::Attaching);
        assert_eq!(b.channel_state(), ChannelState::Connecting);
        assert_eq!(connector.connection_count(), 1);
        assert!(connector.endpoints()[0].starts_with("ws://127.0.0.1:8080/terminal?"));
    }

    #[test]
    fn test_open_sends_initial_resize_and_enables_input() {
        let (b, connector, _sink) = active();

        assert_eq!(b.state(), LifecycleState::Active);
        assert!(b.input_enabled());
        assert_eq!(
            connector.last().unwrap().sent_frames(),
            vec![Frame::resize(geo(24, 80))]
        );
    }

    #[test]
    fn test_input_before_open_is_rejected() {
        let mut b = bridge();
        let mut connector = MockConnector::new();
        b.attach(&mut connector, MockRenderSink::new().boxed())
            .unwrap();

        let result = b.send_input("ls\n");

        assert!(matches!(
            result,
            Err(SendError::NotConnected {
                state: ChannelState::Connecting
            })
        ));
        assert!(connector.last().unwrap().sent().is_empty());
    }

    #[test]
    fn test_keystroke_is_stamped_with_current_geometry() {
        let (mut b, connector, _sink) = active();

        b.send_input("ls\n").unwrap();

        let frames = connector.last().unwrap().sent_frames();
        assert_eq!(frames[1], Frame::stdin("ls\n", geo(24, 80)));
    }

    #[test]
    fn test_remote_stdout_reaches_sink() {
        let (mut b, _connector, sink) = active();

        b.handle_channel_event(stdout_event("file.txt"));

        assert_eq!(sink.output(), "file.txt");
        assert_eq!(b.buffered_frames(), 1);
    }

    #[test]
    fn test_non_stdout_inbound_frames_are_not_rendered() {
        let (mut b, _connector, sink) = active();

        b.handle_channel_event(ChannelEvent::Message(br#"{"operation":"init"}"#.to_vec()));

        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_resize_is_sent_only_after_debounce() {
        // Arrange
        let (mut b, connector, _sink) = active();
        let t0 = Instant::now();

        // Act
        b.observe_resize(geo(40, 120), t0);
        b.poll_timers(t0 + Duration::from_millis(500)).unwrap();
        let before = connector.last().unwrap().sent_frames().len();
        assert_eq!(b.next_deadline(), Some(t0 + Duration::from_secs(1)));
        b.poll_timers(t0 + Duration::from_secs(1)).unwrap();

        // Assert
        let frames = connector.last().unwrap().sent_frames();
        assert_eq!(before, 1);
        assert_eq!(frames.last(), Some(&Frame::resize(geo(40, 120))));
        assert_eq!(b.geometry(), geo(40, 120));
    }

    #[test]
    fn test_resize_settled_while_attaching_is_carried_by_initial_fit() {
        let mut b = bridge();
        let mut connector = MockConnector::new();
        b.attach(&mut connector, MockRenderSink::new().boxed())
            .unwrap();
        let t0 = Instant::now();

        b.observe_resize(geo(50, 160), t0);
        b.poll_timers(t0 + Duration::from_secs(2)).unwrap();
        b.handle_channel_event(ChannelEvent::Opened);

        assert_eq!(
            connector.last().unwrap().sent_frames(),
            vec![Frame::resize(geo(50, 160))]
        );
    }

    #[test]
    fn test_teardown_stops_everything() {
        // Arrange
        let (mut b, connector, sink) = active();
        b.handle_channel_event(stdout_event("before"));
        b.observe_resize(geo(30, 90), Instant::now());

        // Act
        let returned = b.teardown(TeardownReason::Unmount);
        b.handle_channel_event(stdout_event("after"));
        let input = b.send_input("x");

        // Assert
        let wire = connector.last().unwrap();
        assert!(returned.is_some());
        assert_eq!(b.state(), LifecycleState::TornDown);
        assert_eq!(b.channel_state(), ChannelState::Closed);
        assert!(input.is_err());
        assert_eq!(sink.output(), "before");
        assert_eq!(wire.close_calls(), 1);
        assert_eq!(wire.sends_after_close(), 0);
        assert_eq!(b.next_deadline(), None);
    }

    #[test]
    fn test_teardown_is_idempotent_and_keeps_first_reason() {
        let (mut b, connector, _sink) = active();

        assert!(b.teardown(TeardownReason::Unmount).is_some());
        assert!(b.teardown(TeardownReason::TargetChanged).is_none());

        assert_eq!(b.teardown_reason(), Some(&TeardownReason::Unmount));
        assert_eq!(connector.last().unwrap().close_calls(), 1);
    }

    #[test]
    fn test_teardown_before_open_returns_pending_sink() {
        let mut b = bridge();
        let mut connector = MockConnector::new();
        b.attach(&mut connector, MockRenderSink::new().boxed())
            .unwrap();

        let returned = b.teardown(TeardownReason::Unmount);

        assert!(returned.is_some());
        assert_eq!(connector.last().unwrap().close_calls(), 1);
    }

    #[test]
    fn test_remote_close_tears_down_without_reconnect() {
        let (mut b, connector, _sink) = active();

        let reason = b.handle_channel_event(ChannelEvent::Closed {
            reason: Some("pod deleted".to_string()),
        });

        assert_eq!(
            reason,
            Some(TeardownReason::ChannelClosed(TransportError::RemoteClosed(
                "pod deleted".to_string()
            )))
        );
        assert_eq!(b.state(), LifecycleState::TornDown);
        assert_eq!(connector.connection_count(), 1);
    }

    #[test]
    fn test_handshake_failure_tears_down_attaching_bridge() {
        let mut b = bridge();
        let mut connector = MockConnector::new();
        b.attach(&mut connector, MockRenderSink::new().boxed())
            .unwrap();

        let reason = b.handle_channel_event(ChannelEvent::Failed(TransportError::Handshake(
            "HTTP 502".to_string(),
        )));

        assert!(matches!(reason, Some(TeardownReason::ChannelClosed(_))));
        assert_eq!(b.state(), LifecycleState::TornDown);
    }

    #[test]
    fn test_refused_connection_fails_attach() {
        let mut b = bridge();
        let mut connector = MockConnector::new();
        connector.refuse = true;

        let result = b.attach(&mut connector, MockRenderSink::new().boxed());

        assert!(matches!(result, Err(BridgeError::Transport(_))));
        assert_eq!(b.state(), LifecycleState::TornDown);
        assert!(matches!(
            b.teardown_reason(),
            Some(TeardownReason::ChannelClosed(TransportError::Connect { .. }))
        ));
    }

    #[test]
    fn test_send_failure_tears_down() {
        let mut b = bridge();
        let mut connector = MockConnector::new();
        connector.failing_sends = true;
        b.attach(&mut connector, MockRenderSink::new().boxed())
            .unwrap();

        // The initial fit fails on open.
        let reason = b.handle_channel_event(ChannelEvent::Opened);

        assert!(matches!(
            reason,
            Some(TeardownReason::ChannelClosed(TransportError::Io(_)))
        ));
        assert!(!b.input_enabled());
    }

    #[test]
    fn test_attach_twice_is_rejected() {
        let (mut b, mut connector, _sink) = active();

        let result = b.attach(&mut connector, MockRenderSink::new().boxed());

        assert!(matches!(
            result,
            Err(BridgeError::NotIdle(LifecycleState::Active))
        ));
        assert_eq!(connector.connection_count(), 1);
    }

    #[test]
    fn test_retarget_builds_fresh_instance() {
        // Arrange
        let (b, mut connector, sink) = active();
        let old_id = b.instance_id();

        // Act
        let mut next = b
            .retarget(target().with_container("sidecar"), &mut connector)
            .unwrap();
        next.handle_channel_event(ChannelEvent::Opened);
        next.handle_channel_event(stdout_event("new"));

        // Assert
        assert_ne!(next.instance_id(), old_id);
        assert_eq!(next.target().container_name, "sidecar");
        assert_eq!(connector.connection_count(), 2);
        assert_eq!(connector.connection(0).unwrap().close_calls(), 1);
        assert!(connector.endpoints()[1].contains("container=sidecar"));
        assert_eq!(sink.output(), "new");
    }

    #[test]
    fn test_retarget_after_remote_close_reuses_sink() {
        // Arrange: the first session ends on its own
        let (mut b, mut connector, sink) = active();
        b.handle_channel_event(ChannelEvent::Closed {
            reason: Some("pod deleted".to_string()),
        });

        // Act
        let mut next = b
            .retarget(target().with_container("sidecar"), &mut connector)
            .unwrap();
        next.handle_channel_event(ChannelEvent::Opened);
        next.handle_channel_event(stdout_event("again"));

        // Assert
        assert_eq!(next.state(), LifecycleState::Active);
        assert_eq!(connector.connection_count(), 2);
        assert_eq!(sink.output(), "again");
    }

    #[test]
    fn test_teardown_after_channel_error_returns_sink_once() {
        let (mut b, _connector, _sink) = active();
        b.handle_channel_event(ChannelEvent::Failed(TransportError::Io(
            "reset".to_string(),
        )));

        assert!(b.teardown(TeardownReason::Unmount).is_some());
        assert!(b.teardown(TeardownReason::Unmount).is_none());
        assert!(matches!(
            b.teardown_reason(),
            Some(TeardownReason::ChannelClosed(TransportError::Io(_)))
        ));
    }

    #[test]
    fn test_retarget_to_refusing_backend_keeps_sink() {
        // Arrange
        let (b, mut connector, sink) = active();
        connector.refuse = true;

        // Act
        let mut next = b
            .retarget(target().with_container("sidecar"), &mut connector)
            .unwrap();

        // Assert: torn down, but the sink can still be handed on
        assert_eq!(next.state(), LifecycleState::TornDown);
        assert!(matches!(
            next.teardown_reason(),
            Some(TeardownReason::ChannelClosed(TransportError::Connect { .. }))
        ));
        connector.refuse = false;
        let mut third = next
            .retarget(target().with_container("main"), &mut connector)
            .unwrap();
        third.handle_channel_event(ChannelEvent::Opened);
        third.handle_channel_event(stdout_event("back"));
        assert_eq!(sink.output(), "back");
    }

    #[test]
    fn test_select_container_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut b = bridge().with_container_callback(Box::new(move |target: &SessionTarget, name: &str| {
            assert_eq!(target.container_name, "main");
            assert_eq!(name, "sidecar");
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        b.select_container("sidecar");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.target().container_name, "main");
    }

    #[test]
    fn test_drop_closes_transport() {
        let (b, connector, _sink) = active();
        drop(b);
        assert_eq!(connector.last().unwrap().close_calls(), 1);
    }
}
