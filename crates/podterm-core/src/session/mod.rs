//! Session layer: the stateful half of the bridge.
//!
//! - [`channel`]: one duplex transport behind a connection state machine.
//! - [`lifecycle`]: [`TerminalBridge`](lifecycle::TerminalBridge), which owns
//!   a channel, a replay buffer and a coalescer for one target.
//! - [`mock`]: recording fakes for the transport and render-sink seams.

pub mod channel;
pub mod lifecycle;
pub mod mock;

pub use channel::{
    ChannelEvent, ChannelState, Connector, SendError, SessionChannel, Transport, TransportError,
};
pub use lifecycle::{
    BridgeError, BridgeSettings, LifecycleState, RenderSink, TeardownReason, TerminalBridge,
};
