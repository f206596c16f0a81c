//! WebSocket transport for the session channel (tokio-tungstenite).
//!
//! # Task layout
//!
//! ```text
//! WsTransport::send_text ──mpsc──▶ ┌───────────────┐ ──▶ WebSocket
//!                                  │ connection    │
//! WsEvents ◀──mpsc── (gen, event)  │ task          │ ◀── WebSocket
//!                                  └───────────────┘
//! ```
//!
//! [`WsConnector::connect`] spawns one task per connection.  The task does the
//! handshake, then multiplexes outbound text and inbound messages with
//! `tokio::select!`.  Everything it observes is reported as a
//! [`ChannelEvent`] on the connector's event channel; it never touches
//! session state.
//!
//! Every connection gets a generation number and tags its events with it.
//! [`WsEvents`] only yields events from the live generation, so once a
//! transport is closed nothing it queued, before or after, reaches the
//! session loop.  This is what keeps an old target's output out of the new
//! session after a retarget.
//!
//! [`WsTransport::close`] drops the outbound queue.  The task sends what is
//! still queued, sends a Close frame and waits for the peer's answer.  A
//! reaper aborts it if that takes longer than [`CLOSE_TIMEOUT`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use podterm_core::{ChannelEvent, Connector, Endpoint, Transport, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use super::events::EventSource;

/// Upper bound on a closing connection: flushing, Close handshake and all.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Generation value meaning "no live connection".
const NO_GENERATION: u64 = 0;

type TaggedEvent = (u64, ChannelEvent);

/// Opens WebSocket connections and reports their events on one channel.
#[derive(Debug)]
pub struct WsConnector {
    events: mpsc::UnboundedSender<TaggedEvent>,
    live: Arc<AtomicU64>,
    generation: u64,
    /// Each connection task holds a clone; all dropped means all tasks ended.
    tasks_alive: Option<mpsc::Sender<()>>,
    tasks_done: mpsc::Receiver<()>,
}

impl WsConnector {
    /// Creates a connector and the event source its connections report to.
    pub fn new() -> (Self, WsEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let (tasks_alive, tasks_done) = mpsc::channel(1);
        let live = Arc::new(AtomicU64::new(NO_GENERATION));
        let connector = Self {
            events,
            live: Arc::clone(&live),
            generation: NO_GENERATION,
            tasks_alive: Some(tasks_alive),
            tasks_done,
        };
        (connector, WsEvents { rx, live })
    }

    /// Waits, at most [`CLOSE_TIMEOUT`], for every connection task to finish
    /// its Close handshake.  Call after the last transport has been closed
    /// and before the runtime shuts down.
    pub async fn shutdown(mut self) {
        self.tasks_alive = None;
        if tokio::time::timeout(CLOSE_TIMEOUT, self.tasks_done.recv())
            .await
            .is_err()
        {
            debug!("connection tasks still running at shutdown");
        }
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    /// Spawns the connection task.  Must be called inside a tokio runtime.
    fn connect(&mut self, endpoint: &Endpoint) -> Result<WsTransport, TransportError> {
        let Some(alive) = self.tasks_alive.clone() else {
            return Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connector is shut down".to_string(),
            });
        };

        self.generation += 1;
        let generation = self.generation;
        self.live.store(generation, Ordering::Release);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let url = endpoint.as_str().to_string();
        let reporter = Reporter {
            generation,
            events: self.events.clone(),
        };

        let task = tokio::spawn(async move {
            let _alive = alive;
            run_connection(url, outbound_rx, reporter).await;
        });

        Ok(WsTransport {
            outbound: Some(outbound_tx),
            task: Some(task),
            generation,
            live: Arc::clone(&self.live),
        })
    }
}

/// Event stream of a [`WsConnector`], filtered to the live connection.
#[derive(Debug)]
pub struct WsEvents {
    rx: mpsc::UnboundedReceiver<TaggedEvent>,
    live: Arc<AtomicU64>,
}

impl EventSource for WsEvents {
    fn recv(&mut self) -> impl Future<Output = Option<ChannelEvent>> {
        async move {
            loop {
                let (generation, event) = self.rx.recv().await?;
                if generation == self.live.load(Ordering::Acquire) {
                    return Some(event);
                }
                debug!(generation, "dropping event from a closed connection");
            }
        }
    }
}

/// Write handle for one WebSocket connection.
#[derive(Debug)]
pub struct WsTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
    generation: u64,
    live: Arc<AtomicU64>,
}

impl Transport for WsTransport {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(TransportError::Io("connection already closed".to_string()));
        };
        outbound
            .send(text)
            .map_err(|_| TransportError::Io("connection task has stopped".to_string()))
    }

    fn close(&mut self) {
        // Only retire our own generation; a newer connection may be live.
        let _ = self.live.compare_exchange(
            self.generation,
            NO_GENERATION,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.outbound = None;
        if let Some(task) = self.task.take() {
            reap(task);
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Gives a closing task [`CLOSE_TIMEOUT`] to finish, then aborts it.
fn reap(mut task: JoinHandle<()>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
                    debug!("close handshake timed out; aborting connection task");
                    task.abort();
                }
            });
        }
        Err(_) => task.abort(),
    }
}

/// Sends events tagged with one connection's generation.
struct Reporter {
    generation: u64,
    events: mpsc::UnboundedSender<TaggedEvent>,
}

impl Reporter {
    /// Returns `false` once nobody is listening.
    fn report(&self, event: ChannelEvent) -> bool {
        self.events.send((self.generation, event)).is_ok()
    }
}

/// Connection task body.
async fn run_connection(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    reporter: Reporter,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, response)) => {
            debug!("WebSocket handshake complete (HTTP {})", response.status());
            stream
        }
        Err(e) => {
            reporter.report(ChannelEvent::Failed(classify_connect_error(&url, e)));
            return;
        }
    };

    if !reporter.report(ChannelEvent::Opened) {
        return;
    }

    let (mut ws_sink, mut ws_stream) = stream.split();

    loop {
        tokio::select! {
            text = outbound.recv() => match text {
                Some(text) => {
                    if let Err(e) = ws_sink.send(Message::Text(text)).await {
                        warn!("WebSocket write failed: {e}");
                        reporter.report(ChannelEvent::Failed(TransportError::Io(e.to_string())));
                        break;
                    }
                }
                None => {
                    // Everything queued before close has been sent by now.
                    debug!("outbound queue closed; closing WebSocket");
                    let close = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "detached".into(),
                    };
                    if ws_sink.send(Message::Close(Some(close))).await.is_ok() {
                        while let Some(Ok(msg)) = ws_stream.next().await {
                            if msg.is_close() {
                                break;
                            }
                        }
                    }
                    break;
                }
            },

            msg = ws_stream.next() => {
                let event = match msg {
                    Some(Ok(Message::Text(text))) => ChannelEvent::Message(text.into_bytes()),
                    Some(Ok(Message::Binary(data))) => ChannelEvent::Message(data),
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.into_owned())
                            .filter(|r| !r.is_empty());
                        // Flushes the Close reply tungstenite queued for us.
                        let _ = ws_sink.close().await;
                        reporter.report(ChannelEvent::Closed { reason });
                        break;
                    }
                    // Ping/pong are answered by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        reporter.report(ChannelEvent::Failed(TransportError::Io(e.to_string())));
                        break;
                    }
                    None => {
                        reporter.report(ChannelEvent::Closed { reason: None });
                        break;
                    }
                };
                if !reporter.report(event) {
                    break;
                }
            }
        }
    }
}

/// Maps a failed `connect_async` onto the transport error taxonomy: socket
/// level failures are `Connect`, everything after the TCP connect is
/// `Handshake`.
fn classify_connect_error(url: &str, err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Io(e) => TransportError::Connect {
            endpoint: url.to_string(),
            reason: e.to_string(),
        },
        tungstenite::Error::Url(e) => TransportError::Connect {
            endpoint: url.to_string(),
            reason: e.to_string(),
        },
        tungstenite::Error::Http(response) => {
            TransportError::Handshake(format!("server answered HTTP {}", response.status()))
        }
        other => TransportError::Handshake(other.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
