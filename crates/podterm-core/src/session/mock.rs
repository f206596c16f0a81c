//! Recording fakes for the session traits.
//!
//! # Why recording fakes?
//!
//! The real transport is a WebSocket driven by background tasks, and the real
//! render sink writes to a TTY.  Neither can be observed from a plain unit
//! test.  The fakes here replace both with in-memory recording so tests can
//! assert exactly what went over the wire, in what order, and whether anything
//! happened after the session was torn down.
//!
//! All records live behind `Arc<Mutex<...>>` so a clone kept by the test sees
//! everything the copy handed to the bridge records.
//!
//! # Usage in tests
//!
//! ```ignore
//! let mut connector = MockConnector::new();
//! let sink = MockRenderSink::new();
//! bridge.attach(&mut connector, sink.boxed())?;
//! bridge.handle_channel_event(ChannelEvent::Opened);
//!
//! let wire = connector.last().unwrap();
//! assert_eq!(wire.sent_frames()[0], Frame::resize(Geometry::DEFAULT));
//! ```

use std::sync::{Arc, Mutex};

use crate::domain::replay::Sink;
use crate::domain::target::Endpoint;
use crate::protocol::codec::decode;
use crate::protocol::frame::{Frame, Operation};
use crate::session::channel::{Connector, Transport, TransportError};
use crate::session::lifecycle::RenderSink;

/// Everything one [`MockTransport`] observed.
#[derive(Debug, Default)]
pub struct WireLog {
    /// Text messages accepted for sending, in order.
    pub sent: Vec<String>,
    /// Number of `close` calls.
    pub close_calls: usize,
    /// Number of `send_text` calls made after the first `close`.
    pub sends_after_close: usize,
}

/// A transport that records instead of sending.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    log: Arc<Mutex<WireLog>>,
    /// When `true`, every `send_text` fails with [`TransportError::Io`].
    pub should_fail: bool,
}

impl MockTransport {
    /// Creates an empty, healthy transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw text messages sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.log.lock().unwrap().sent.clone()
    }

    /// Sent messages decoded back into frames.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.log
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter_map(|text| decode(text.as_bytes()).ok())
            .collect()
    }

    /// How many times the transport was closed.
    pub fn close_calls(&self) -> usize {
        self.log.lock().unwrap().close_calls
    }

    /// How many sends were attempted on a closed transport.
    pub fn sends_after_close(&self) -> usize {
        self.log.lock().unwrap().sends_after_close
    }
}

impl Transport for MockTransport {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        if log.close_calls > 0 {
            log.sends_after_close += 1;
            return Err(TransportError::Io("send on closed transport".into()));
        }
        if self.should_fail {
            return Err(TransportError::Io("mock failure".into()));
        }
        log.sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().unwrap().close_calls += 1;
    }
}

/// A connector that hands out [`MockTransport`]s and keeps a handle to each.
#[derive(Debug, Default)]
pub struct MockConnector {
    connections: Vec<(String, MockTransport)>,
    /// When `true`, `connect` fails with [`TransportError::Connect`].
    pub refuse: bool,
    /// When `true`, transports are created with `should_fail` set.
    pub failing_sends: bool,
}

impl MockConnector {
    /// Creates a connector that accepts every connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transports created so far.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The `index`-th transport created, oldest first.
    pub fn connection(&self, index: usize) -> Option<&MockTransport> {
        self.connections.get(index).map(|(_, t)| t)
    }

    /// The most recently created transport.
    pub fn last(&self) -> Option<&MockTransport> {
        self.connections.last().map(|(_, t)| t)
    }

    /// Endpoint URLs in connection order.
    pub fn endpoints(&self) -> Vec<String> {
        self.connections.iter().map(|(url, _)| url.clone()).collect()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&mut self, endpoint: &Endpoint) -> Result<MockTransport, TransportError> {
        if self.refuse {
            return Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            });
        }
        let transport = MockTransport {
            should_fail: self.failing_sends,
            ..MockTransport::default()
        };
        self.connections
            .push((endpoint.to_string(), transport.clone()));
        Ok(transport)
    }
}

/// A render sink that records every frame it is given.
#[derive(Debug, Clone, Default)]
pub struct MockRenderSink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl MockRenderSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A boxed clone sharing this sink's records, ready to hand to a bridge.
    pub fn boxed(&self) -> RenderSink {
        Box::new(self.clone())
    }

    /// Frames delivered so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    /// Number of frames delivered so far.
    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    /// Concatenated `data` of every delivered `stdout` frame.
    pub fn output(&self) -> String {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.operation == Operation::Stdout)
            .filter_map(|f| f.data.as_deref())
            .collect()
    }
}

impl Sink<Frame> for MockRenderSink {
    fn deliver(&mut self, item: &Frame) {
        self.frames.lock().unwrap().push(item.clone());
    }
}
