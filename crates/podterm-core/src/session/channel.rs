//! The session channel: one duplex transport behind a small state machine.
//!
//! ```text
//!               open()              Opened
//! Disconnected ───────▶ Connecting ────────▶ Open
//!                           │                  │
//!                           │ Failed           │ Failed / Closed / close()
//!                           ▼                  ▼
//!                         Closed ◀─────────────┘
//! ```
//!
//! `Closed` is terminal.  A new attach builds a fresh channel; a channel is
//! never reopened.
//!
//! The channel does not own an event loop.  The runtime delivers transport
//! events through [`SessionChannel::handle_event`], and outbound frames go
//! through [`SessionChannel::send`], which encodes them and hands the text to
//! the [`Transport`].  Reconnection is not the channel's job: a transport
//! error closes it and is reported to the caller exactly once.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::target::Endpoint;
use crate::protocol::codec::{decode, encode, EncodeError};
use crate::protocol::frame::Frame;

/// Connection state of a [`SessionChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Created, `open` not yet called.
    Disconnected,
    /// Transport requested, handshake in progress.
    Connecting,
    /// Handshake done; frames flow both ways.
    Open,
    /// Terminal.  The transport has been released.
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Fatal transport-level failures.  Any of these closes the channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be initiated at all.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The WebSocket upgrade (or TLS) handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Read or write failure on an established connection.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The remote end closed the connection.
    #[error("remote closed the session: {0}")]
    RemoteClosed(String),
}

/// Errors from [`SessionChannel::send`].
#[derive(Debug, Error)]
pub enum SendError {
    /// The channel is not `Open`.  Nothing was sent; the channel is unchanged.
    #[error("channel is not connected (state: {state})")]
    NotConnected { state: ChannelState },

    /// The frame could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The transport rejected the write.  The channel is now `Closed`.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Events the runtime feeds into a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The handshake completed.
    Opened,
    /// One inbound message (text or binary payload).
    Message(Vec<u8>),
    /// The remote closed the connection cleanly.
    Closed { reason: Option<String> },
    /// The handshake or an established connection failed.
    Failed(TransportError),
}

/// Write half of a duplex connection, as seen by the channel.
///
/// Implementations must not block: `send_text` queues the message for a
/// background writer.
pub trait Transport {
    /// Queues one text message.  An error means the connection is dead.
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Releases the connection.  The channel calls this at most once.
    fn close(&mut self);
}

/// Creates transports.  One call, one underlying connection.
pub trait Connector {
    /// Transport type produced by this connector.
    type Transport: Transport;

    /// Starts connecting to `endpoint`.  Completion is reported later as a
    /// [`ChannelEvent::Opened`] or [`ChannelEvent::Failed`].
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the connection cannot even be started.
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Self::Transport, TransportError>;
}

/// The single inbound consumer slot.
pub type FrameConsumer = Box<dyn FnMut(Frame) + Send>;

/// A duplex session over one transport.
pub struct SessionChannel<T: Transport> {
    state: ChannelState,
    endpoint: Endpoint,
    transport: Option<T>,
    consumer: Option<FrameConsumer>,
    dropped_frames: u64,
}

impl<T: Transport> SessionChannel<T> {
    /// Creates a `Disconnected` channel for `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            state: ChannelState::Disconnected,
            endpoint,
            transport: None,
            consumer: None,
            dropped_frames: 0,
        }
    }

    /// Starts the connection.  `Disconnected → Connecting`, or straight to
    /// `Closed` if the connector fails.
    ///
    /// # Errors
    ///
    /// Returns the connector's error (the channel is then `Closed`), or a
    /// [`TransportError::Connect`] if this channel was already opened once.
    pub fn open<C>(&mut self, connector: &mut C) -> Result<(), TransportError>
    where
        C: Connector<Transport = T>,
    {
        if self.state != ChannelState::Disconnected {
            return Err(TransportError::Connect {
                endpoint: self.endpoint.to_string(),
                reason: format!("channel already used (state: {})", self.state),
            });
        }

        self.state = ChannelState::Connecting;
        debug!("connecting to {}", self.endpoint);

        match connector.connect(&self.endpoint) {
            Ok(transport) => {
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                warn!("could not start connection: {e}");
                self.state = ChannelState::Closed;
                Err(e)
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// `true` when frames can be sent.
    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// The endpoint this channel was built for.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of inbound messages dropped because they failed to decode.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Registers the inbound consumer, replacing any previous one.
    pub fn on_frame(&mut self, consumer: FrameConsumer) {
        if self.consumer.replace(consumer).is_some() {
            debug!("replaced inbound frame consumer");
        }
    }

    /// Removes the inbound consumer.  Later frames are dropped.
    pub fn clear_consumer(&mut self) {
        self.consumer = None;
    }

    /// Encodes and sends one frame.
    ///
    /// # Errors
    ///
    /// - [`SendError::NotConnected`] if the channel is not `Open` (no-op).
    /// - [`SendError::Transport`] if the write failed; the channel is then
    ///   `Closed`.
    pub fn send(&mut self, frame: &Frame) -> Result<(), SendError> {
        if self.state != ChannelState::Open {
            return Err(SendError::NotConnected { state: self.state });
        }
        let Some(transport) = self.transport.as_mut() else {
            return Err(SendError::NotConnected { state: self.state });
        };

        let text = encode(frame)?;
        if let Err(e) = transport.send_text(text) {
            warn!("send failed, closing channel: {e}");
            self.release();
            return Err(SendError::Transport(e));
        }
        debug!("sent {} frame", frame.operation);
        Ok(())
    }

    /// Applies one transport event.
    ///
    /// Returns the fatal error when this event closed the channel, so the
    /// caller can react exactly once.  Decode failures are logged and dropped;
    /// they never change the state.
    pub fn handle_event(&mut self, event: ChannelEvent) -> Option<TransportError> {
        match event {
            ChannelEvent::Opened => {
                if self.state == ChannelState::Connecting {
                    self.state = ChannelState::Open;
                    info!("channel open: {}", self.endpoint);
                } else {
                    debug!("ignoring Opened in state {}", self.state);
                }
                None
            }

            ChannelEvent::Message(bytes) => {
                if self.state != ChannelState::Open {
                    debug!("ignoring inbound message in state {}", self.state);
                    return None;
                }
                match decode(&bytes) {
                    Ok(frame) => match self.consumer.as_mut() {
                        Some(consumer) => consumer(frame),
                        None => debug!("no consumer; dropping {} frame", frame.operation),
                    },
                    Err(e) => {
                        self.dropped_frames += 1;
                        warn!("dropping undecodable frame: {e}");
                    }
                }
                None
            }

            ChannelEvent::Closed { reason } => {
                if self.state == ChannelState::Closed {
                    return None;
                }
                let reason = reason.unwrap_or_else(|| "connection closed".to_string());
                info!("remote closed channel: {reason}");
                self.release();
                Some(TransportError::RemoteClosed(reason))
            }

            ChannelEvent::Failed(err) => {
                if self.state == ChannelState::Closed {
                    return None;
                }
                warn!("channel failed in state {}: {err}", self.state);
                self.release();
                Some(err)
            }
        }
    }

    /// Closes the channel.  Safe to call any number of times from any state;
    /// only the first call releases the transport.
    ///
    /// Returns `true` if this call performed the close.
    pub fn close(&mut self) -> bool {
        if self.state == ChannelState::Closed {
            return false;
        }
        debug!("closing channel in state {}", self.state);
        self.release();
        true
    }

    fn release(&mut self) {
        self.state = ChannelState::Closed;
        self.consumer = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }
}

impl<T: Transport> fmt::Debug for SessionChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionChannel")
            .field("state", &self.state)
            .field("endpoint", &self.endpoint.as_str())
            .field("has_consumer", &self.consumer.is_some())
            .finish()
    }
}

impl<T: Transport> Drop for SessionChannel<T> {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
