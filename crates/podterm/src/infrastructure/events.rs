//! Where the session loop gets transport events from.

use std::future::Future;

use podterm_core::ChannelEvent;
use tokio::sync::mpsc;

/// A source of [`ChannelEvent`]s for the session loop.
///
/// `recv` is polled inside `tokio::select!`, so it must be cancel-safe: an
/// event is either returned or still queued.
pub trait EventSource {
    /// The next event, or `None` once every producer is gone.
    fn recv(&mut self) -> impl Future<Output = Option<ChannelEvent>>;
}

impl EventSource for mpsc::UnboundedReceiver<ChannelEvent> {
    fn recv(&mut self) -> impl Future<Output = Option<ChannelEvent>> {
        mpsc::UnboundedReceiver::recv(self)
    }
}
