//! Bounded replay buffer with backlog-then-live delivery.
//!
//! The socket starts producing output as soon as the remote shell is attached,
//! but the component that draws it (the render sink) may attach later, or
//! detach and re-attach when the display is rebuilt.  The replay buffer sits
//! between the two:
//!
//! ```text
//! channel ──push──▶ [ f1 f2 f3 … fN ] ──deliver──▶ sink(s)
//!                     oldest    newest
//! ```
//!
//! - [`ReplayBuffer::push`] always succeeds.  When the buffer is full the
//!   oldest entry is evicted.  This is best-effort replay, not durability.
//! - [`ReplayBuffer::subscribe`] hands a **new** sink the whole backlog in
//!   order, then every later push.
//! - [`ReplayBuffer::unsubscribe`] returns the sink and remembers how far it
//!   got, so [`ReplayBuffer::resubscribe`] with the same sink never delivers a
//!   frame twice.
//!
//! Every pushed item gets a monotonically increasing sequence number; each
//! subscriber keeps a cursor (the next sequence number it has not seen).

use std::collections::{HashMap, VecDeque};
use std::fmt;

use tracing::trace;

/// Anything that can consume items from a [`ReplayBuffer`].
///
/// Closures taking `&T` implement this automatically.
pub trait Sink<T> {
    /// Receives one item.  Called in push order.
    fn deliver(&mut self, item: &T);
}

impl<T, F> Sink<T> for F
where
    F: FnMut(&T),
{
    fn deliver(&mut self, item: &T) {
        self(item)
    }
}

/// Boxed sink as stored by the buffer.
pub type BoxedSink<T> = Box<dyn Sink<T> + Send>;

/// Handle identifying one sink instance across unsubscribe/resubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// Default backlog size, in frames.
pub const DEFAULT_REPLAY_CAPACITY: usize = 100;

struct Entry<T> {
    seq: u64,
    item: T,
}

struct Subscriber<T> {
    id: SinkId,
    sink: BoxedSink<T>,
    /// Sequence number of the next item this sink has not received.
    cursor: u64,
}

/// Ordered, bounded backlog with replay-on-subscribe.
pub struct ReplayBuffer<T> {
    entries: VecDeque<Entry<T>>,
    capacity: usize,
    next_seq: u64,
    next_sink_id: u64,
    subscribers: Vec<Subscriber<T>>,
    /// Cursors of sinks that were unsubscribed and may come back.
    detached: HashMap<SinkId, u64>,
}

impl<T> ReplayBuffer<T> {
    /// Creates a buffer holding at most `capacity` items (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
            next_sink_id: 0,
            subscribers: Vec::new(),
            detached: HashMap::new(),
        }
    }

    /// Appends an item and delivers it to every live subscriber.
    ///
    /// Returns `true` if an old item had to be evicted to make room.
    pub fn push(&mut self, item: T) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;

        for sub in &mut self.subscribers {
            sub.sink.deliver(&item);
            sub.cursor = seq + 1;
        }

        self.entries.push_back(Entry { seq, item });
        if self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                trace!(
                    seq = evicted.seq,
                    capacity = self.capacity,
                    "replay buffer full; evicted oldest"
                );
            }
            self.prune_detached();
            return true;
        }
        false
    }

    /// Attaches a new sink.  It immediately receives every buffered item, in
    /// order, and then every later push until unsubscribed.
    pub fn subscribe(&mut self, sink: BoxedSink<T>) -> SinkId {
        let id = SinkId(self.next_sink_id);
        self.next_sink_id += 1;
        self.attach(id, sink, 0);
        id
    }

    /// Re-attaches a sink that was previously returned by
    /// [`unsubscribe`](Self::unsubscribe).
    ///
    /// Only items the sink has not seen yet (and that are still buffered) are
    /// replayed.  An `id` this buffer never detached is treated as a brand-new
    /// subscription and gets the full backlog under a fresh id.
    pub fn resubscribe(&mut self, id: SinkId, sink: BoxedSink<T>) -> SinkId {
        match self.detached.remove(&id) {
            Some(cursor) => {
                self.attach(id, sink, cursor);
                id
            }
            None => self.subscribe(sink),
        }
    }

    /// Detaches a sink and hands it back.  No further items are delivered to
    /// it.  Returns `None` if `id` is not currently subscribed.
    pub fn unsubscribe(&mut self, id: SinkId) -> Option<BoxedSink<T>> {
        let pos = self.subscribers.iter().position(|s| s.id == id)?;
        let sub = self.subscribers.remove(pos);
        self.detached.insert(sub.id, sub.cursor);
        Some(sub.sink)
    }

    /// Drops every buffered item.  Live subscribers stay attached.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Iterates over buffered items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }

    /// Forgets detached cursors older than the oldest buffered item.  Such a
    /// sink has missed everything still buffered, so resubscribing it is the
    /// same as a fresh subscription.
    fn prune_detached(&mut self) {
        let oldest = self.entries.front().map_or(self.next_seq, |e| e.seq);
        self.detached.retain(|_, cursor| *cursor >= oldest);
    }

    fn attach(&mut self, id: SinkId, mut sink: BoxedSink<T>, cursor: u64) {
        for entry in self.entries.iter().filter(|e| e.seq >= cursor) {
            sink.deliver(&entry.item);
        }
        self.subscribers.push(Subscriber {
            id,
            sink,
            cursor: self.next_seq,
        });
    }
}

impl<T> Default for ReplayBuffer<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }
}

impl<T> fmt::Debug for ReplayBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayBuffer")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
