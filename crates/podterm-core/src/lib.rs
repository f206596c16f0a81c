//! # podterm-core
//!
//! Transport-agnostic core of the remote pod-terminal bridge.
//!
//! A bridge attaches one local terminal to one remote container shell over a
//! duplex socket.  Keystrokes, resize notifications and remote output are all
//! multiplexed as JSON frames on that single connection.  This crate holds
//! everything about that exchange that can be decided without touching a
//! socket, a timer or a TTY:
//!
//! - **`protocol`** – The wire format.  [`Frame`] is one JSON object with an
//!   `operation` discriminant; [`encode`] and [`decode`] convert between the
//!   struct and the text that travels over the socket.
//!
//! - **`domain`** – Pure building blocks: the [`SessionTarget`] that names the
//!   remote container, the [`ReplayBuffer`] that hands backlog-then-live frames
//!   to a render sink, and the [`Coalescer`] that debounces resizes.
//!
//! - **`session`** – The stateful parts: [`SessionChannel`] wraps a transport
//!   behind the `Disconnected → Connecting → Open → Closed` state machine, and
//!   [`TerminalBridge`] is the lifecycle controller that wires everything
//!   together for one target.
//!
//! Time is always passed in as an [`std::time::Instant`] and transports are
//! traits, so the runtime crate decides how events are scheduled.  Everything
//! here runs on the caller's thread; nothing spawns.

pub mod domain;
pub mod protocol;
pub mod session;

pub use domain::coalescer::Coalescer;
pub use domain::replay::{ReplayBuffer, Sink, SinkId};
pub use domain::target::{Endpoint, EndpointError, SessionTarget};
pub use protocol::codec::{decode, encode, DecodeError, EncodeError};
pub use protocol::frame::{Frame, Geometry, Operation};
pub use session::channel::{
    ChannelEvent, ChannelState, Connector, SendError, SessionChannel, Transport, TransportError,
};
pub use session::lifecycle::{
    BridgeError, BridgeSettings, LifecycleState, RenderSink, TeardownReason, TerminalBridge,
};
