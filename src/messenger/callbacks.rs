//! Application callbacks.
//!
//! Handlers are owned by the messenger and given to it at construction.

use std::fmt;

use bytes::Bytes;

use crate::types::{ConnectionState, NodeId};

/// Called with `(source, payload)` once per unique received message.
pub type DataHandler = Box<dyn FnMut(NodeId, &Bytes) + Send>;

/// Called with `(peer, message_id, attempts)` when a message is acknowledged.
pub type AckHandler = Box<dyn FnMut(NodeId, u16, u8) + Send>;

/// Called with `(message_id, attempts)` when a message is abandoned.
pub type DropHandler = Box<dyn FnMut(u16, u8) + Send>;

/// Called with `(peer, state)` when a peer connects or disconnects.
pub type PeerStateHandler = Box<dyn FnMut(NodeId, ConnectionState) + Send>;

/// Handlers invoked by the messenger. Unset handlers are skipped.
#[derive(Default)]
pub struct Callbacks {
    on_data_received: Option<DataHandler>,
    on_ack_received: Option<AckHandler>,
    on_message_dropped: Option<DropHandler>,
    on_peer_state: Option<PeerStateHandler>,
}

impl Callbacks {
    /// Creates an empty set of callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data handler.
    #[must_use]
    pub fn on_data_received(mut self, f: impl FnMut(NodeId, &Bytes) + Send + 'static) -> Self {
        self.on_data_received = Some(Box::new(f));
        self
    }

    /// Sets the acknowledgment handler.
    #[must_use]
    pub fn on_ack_received(mut self, f: impl FnMut(NodeId, u16, u8) + Send + 'static) -> Self {
        self.on_ack_received = Some(Box::new(f));
        self
    }

    /// Sets the drop handler.
    #[must_use]
    pub fn on_message_dropped(mut self, f: impl FnMut(u16, u8) + Send + 'static) -> Self {
        self.on_message_dropped = Some(Box::new(f));
        self
    }

    /// Sets the peer connection handler.
    #[must_use]
    pub fn on_peer_state(
        mut self,
        f: impl FnMut(NodeId, ConnectionState) + Send + 'static,
    ) -> Self {
        self.on_peer_state = Some(Box::new(f));
        self
    }

    pub(crate) fn data_received(&mut self, source: NodeId, payload: &Bytes) {
        if let Some(f) = self.on_data_received.as_mut() {
            f(source, payload);
        }
    }

    pub(crate) fn ack_received(&mut self, peer: NodeId, message_id: u16, attempts: u8) {
        if let Some(f) = self.on_ack_received.as_mut() {
            f(peer, message_id, attempts);
        }
    }

    pub(crate) fn message_dropped(&mut self, message_id: u16, attempts: u8) {
        if let Some(f) = self.on_message_dropped.as_mut() {
            f(message_id, attempts);
        }
    }

    pub(crate) fn peer_state(&mut self, peer: NodeId, state: ConnectionState) {
        if let Some(f) = self.on_peer_state.as_mut() {
            f(peer, state);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_data_received", &self.on_data_received.is_some())
            .field("on_ack_received", &self.on_ack_received.is_some())
            .field("on_message_dropped", &self.on_message_dropped.is_some())
            .field("on_peer_state", &self.on_peer_state.is_some())
            .finish()
    }
}
