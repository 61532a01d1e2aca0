//! Outward interface of the acquisition loop.
//!
//! A [`Sink`] receives owned packet snapshots and device-info mappings. The
//! loop never holds on to anything it has pushed.
//!
//! [`ChannelSink`] forwards both into a `tokio::sync::mpsc` channel so the
//! blocking acquisition thread can feed an async consumer:
//!
//! ```no_run
//! use explore_rs::sink::{ChannelSink, SinkEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (sink, mut rx) = ChannelSink::new(256);
//! // move `sink` into tokio::task::spawn_blocking(...) running the loop
//! # drop(sink);
//! while let Some(event) = rx.recv().await {
//!     if let SinkEvent::Packet(p) = event {
//!         println!("{p}");
//!     }
//! }
//! # }
//! ```

use log::warn;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::types::Packet;

/// Consumer of decoded packets.
///
/// Implementations must not block indefinitely; the acquisition loop calls
/// them inline between frame reads.
pub trait Sink {
    fn push(&mut self, packet: Packet);

    /// Called for every device-info packet, in every mode.
    fn notify_device_info(&mut self, fields: Map<String, Value>);
}

/// Everything a sink can be told, as one value.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Packet(Packet),
    DeviceInfo(Map<String, Value>),
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn push(&mut self, packet: Packet) {
        Sink::push(&mut **self, packet);
    }

    fn notify_device_info(&mut self, fields: Map<String, Value>) {
        Sink::notify_device_info(&mut **self, fields);
    }
}

/// Collects events in memory.
impl Sink for Vec<SinkEvent> {
    fn push(&mut self, packet: Packet) {
        Vec::push(self, SinkEvent::Packet(packet));
    }

    fn notify_device_info(&mut self, fields: Map<String, Value>) {
        Vec::push(self, SinkEvent::DeviceInfo(fields));
    }
}

/// Sends events to an async receiver.
///
/// Uses `blocking_send`, so it must be driven from a thread outside the
/// tokio runtime (e.g. `spawn_blocking`). Once the receiver is gone,
/// further events are discarded.
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
    closed: bool,
}

impl ChannelSink {
    /// Create a sink and its receiver with room for `capacity` events.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::from_sender(tx), rx)
    }

    pub fn from_sender(tx: mpsc::Sender<SinkEvent>) -> Self {
        Self { tx, closed: false }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn send(&mut self, event: SinkEvent) {
        if self.closed {
            return;
        }
        if self.tx.blocking_send(event).is_err() {
            warn!("sink: receiver dropped, discarding further packets");
            self.closed = true;
        }
    }
}

impl Sink for ChannelSink {
    fn push(&mut self, packet: Packet) {
        self.send(SinkEvent::Packet(packet));
    }

    fn notify_device_info(&mut self, fields: Map<String, Value>) {
        self.send(SinkEvent::DeviceInfo(fields));
    }
}
