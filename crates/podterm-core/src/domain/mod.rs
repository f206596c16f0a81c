//! Domain layer: pure building blocks with no I/O.
//!
//! - [`target`]: which remote container to attach to, and the socket URL for it.
//! - [`replay`]: the bounded backlog that feeds render sinks.
//! - [`coalescer`]: keystroke stamping and resize debouncing.

pub mod coalescer;
pub mod replay;
pub mod target;

pub use coalescer::Coalescer;
pub use replay::{ReplayBuffer, Sink, SinkId};
pub use target::{Endpoint, EndpointError, SessionTarget};
