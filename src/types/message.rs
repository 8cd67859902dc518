//! Addressed messages exchanged between nodes.

use bytes::Bytes;

use crate::protocol::MessageType;

/// Identifier of a node on the radio network.
pub type NodeId = u8;

/// Reserved node id; never a valid sender.
pub const RESERVED_NODE_ID: NodeId = 0;

/// Destination id addressing every node in range.
pub const BROADCAST: NodeId = 0xFF;

/// A single addressed unit of communication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sender's node id.
    pub source: NodeId,
    /// Intended receiver, or [`BROADCAST`].
    pub destination: NodeId,
    /// Sender-assigned sequence number. On Ack frames, the id being acknowledged.
    pub message_id: u16,
    /// Frame purpose.
    pub kind: MessageType,
    /// Sender asks for an acknowledgment.
    pub requires_ack: bool,
    /// Application bytes (empty for Ack frames).
    pub payload: Bytes,
}

impl Message {
    /// Creates a data message.
    #[must_use]
    pub fn data(
        source: NodeId,
        destination: NodeId,
        message_id: u16,
        payload: impl Into<Bytes>,
        requires_ack: bool,
    ) -> Self {
        Self {
            source,
            destination,
            message_id,
            kind: MessageType::Data,
            requires_ack,
            payload: payload.into(),
        }
    }

    /// Creates an acknowledgment for `acked_id`.
    #[must_use]
    pub const fn ack(source: NodeId, destination: NodeId, acked_id: u16) -> Self {
        Self {
            source,
            destination,
            message_id: acked_id,
            kind: MessageType::Ack,
            requires_ack: false,
            payload: Bytes::new(),
        }
    }

    /// Creates a keepalive ping.
    #[must_use]
    pub const fn ping(
        source: NodeId,
        destination: NodeId,
        message_id: u16,
        requires_ack: bool,
    ) -> Self {
        Self {
            source,
            destination,
            message_id,
            kind: MessageType::Ping,
            requires_ack,
            payload: Bytes::new(),
        }
    }

    /// Returns true if addressed to every node.
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST
    }

    /// Returns true if `node` should process this message.
    #[must_use]
    pub const fn is_for(&self, node: NodeId) -> bool {
        self.destination == node || self.is_broadcast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_has_empty_payload() {
        let ack = Message::ack(1, 3, 42);
        assert_eq!(ack.kind, MessageType::Ack);
        assert_eq!(ack.message_id, 42);
        assert!(ack.payload.is_empty());
        assert!(!ack.requires_ack);
    }

    #[test]
    fn test_addressing() {
        let msg = Message::data(3, 1, 7, &b"x"[..], true);
        assert!(msg.is_for(1));
        assert!(!msg.is_for(2));

        let bcast = Message::ping(3, BROADCAST, 8, false);
        assert!(bcast.is_broadcast());
        assert!(bcast.is_for(2));
    }
}
