//! Outbound handles to connected peers.
//!
//! The relay never touches a socket directly. Each carrier, monitor and AI
//! connection is represented by a [`PeerSink`]: a cloneable sender into the
//! task or actor that owns the real socket. Closing a sink asks that owner to
//! send a close frame and stop.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// A frame queued for a peer's socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// Sender half of a peer connection.
///
/// Equality and hashing use the peer id only, so clones of one sink collapse
/// to a single entry in a listener set.
#[derive(Debug, Clone)]
pub struct PeerSink {
    id: Uuid,
    tx: UnboundedSender<OutboundFrame>,
    closing: Arc<AtomicBool>,
}

impl PeerSink {
    /// Create a sink and the receiver its socket owner should drain.
    pub fn channel() -> (PeerSink, UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = PeerSink {
            id: Uuid::new_v4(),
            tx,
            closing: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// True while the owner is still draining and no close was requested.
    pub fn is_open(&self) -> bool {
        !self.closing.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Queue a text frame. Returns `false` if the peer is gone or closing.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.is_open() && self.tx.send(OutboundFrame::Text(text.into())).is_ok()
    }

    /// Serialize and queue a JSON frame.
    pub fn send_json<T: serde::Serialize>(&self, value: &T) -> Result<bool, serde_json::Error> {
        let text = serde_json::to_string(value)?;
        Ok(self.send_text(text))
    }

    /// Ask the owner to close the socket. Idempotent; later sends are refused.
    pub fn close(&self) {
        if !self.closing.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(OutboundFrame::Close);
        }
    }
}

impl PartialEq for PeerSink {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerSink {}

impl Hash for PeerSink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
