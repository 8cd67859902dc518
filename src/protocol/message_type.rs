//! Message type tags for the radio protocol.
//!
//! The type tag is the fifth header byte and decides how a frame is handled.

/// Purpose of a frame on the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Application payload.
    Data = 0,
    /// Acknowledgment of a received message id.
    Ack = 1,
    /// Keepalive / liveness check.
    Ping = 2,
}

impl MessageType {
    /// Attempts to parse a message type from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Data),
            1 => Some(Self::Ack),
            2 => Some(Self::Ping),
            _ => None,
        }
    }

    /// Returns true if frames of this type may request an acknowledgment.
    #[must_use]
    pub const fn can_request_ack(self) -> bool {
        !matches!(self, Self::Ack)
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_from_byte() {
        assert_eq!(MessageType::from_byte(0), Some(MessageType::Data));
        assert_eq!(MessageType::from_byte(1), Some(MessageType::Ack));
        assert_eq!(MessageType::from_byte(2), Some(MessageType::Ping));
        assert_eq!(MessageType::from_byte(3), None);
        assert_eq!(MessageType::from_byte(0xFF), None);
    }

    #[test]
    fn test_message_type_to_byte() {
        assert_eq!(u8::from(MessageType::Ping), 2);
        assert!(!MessageType::Ack.can_request_ack());
        assert!(MessageType::Data.can_request_ack());
    }
}
