//! Radio message encoding and decoding.
//!
//! Every radio packet carries exactly one message:
//! ```text
//! ┌────────┬────────┬──────────────┬──────┬───────┬─────────────┐
//! │ source │  dest  │ msg id (LE)  │ type │ flags │   payload   │
//! │ 1 byte │ 1 byte │   2 bytes    │ 1 b  │  1 b  │ 0..max bytes│
//! └────────┴────────┴──────────────┴──────┴───────┴─────────────┘
//! ```
//!
//! `flags` bit 0 requests an acknowledgment; it is ignored on Ack frames. Ack
//! frames reuse the message id field for the acknowledged id and carry no
//! payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, EncodeError};
use crate::protocol::MessageType;
use crate::types::{Message, RESERVED_NODE_ID};

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 6;

/// Default maximum payload size.
pub const MAX_PAYLOAD: usize = 64;

/// Largest packet the radio can carry (SX127x FIFO).
pub const MAX_FRAME_LEN: usize = 255;

/// Flag bit requesting an acknowledgment.
pub const FLAG_REQUIRES_ACK: u8 = 1 << 0;

/// Encodes a message into a radio packet.
///
/// Fails if the payload is longer than `max_payload`.
pub fn encode(message: &Message, max_payload: usize) -> Result<Bytes, EncodeError> {
    if message.payload.len() > max_payload {
        return Err(EncodeError::PayloadTooLarge {
            size: message.payload.len(),
            max: max_payload,
        });
    }

    let flags = if message.requires_ack {
        FLAG_REQUIRES_ACK
    } else {
        0
    };

    let mut buf = BytesMut::with_capacity(HEADER_LEN + message.payload.len());
    buf.put_u8(message.source);
    buf.put_u8(message.destination);
    buf.put_u16_le(message.message_id);
    buf.put_u8(message.kind.into());
    buf.put_u8(flags);
    buf.put_slice(&message.payload);
    Ok(buf.freeze())
}

/// Decodes a radio packet into a message.
///
/// Never panics; every malformed input is reported through [`DecodeError`].
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
    if data.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            len: data.len(),
            need: HEADER_LEN,
        });
    }

    let mut cursor = data;
    let source = cursor.get_u8();
    let destination = cursor.get_u8();
    let message_id = cursor.get_u16_le();
    let type_byte = cursor.get_u8();
    let flags = cursor.get_u8();

    let kind = MessageType::from_byte(type_byte).ok_or(DecodeError::UnknownType(type_byte))?;
    if source == RESERVED_NODE_ID {
        return Err(DecodeError::InvalidSource);
    }

    Ok(Message {
        source,
        destination,
        message_id,
        kind,
        requires_ack: kind.can_request_ack() && flags & FLAG_REQUIRES_ACK != 0,
        payload: Bytes::copy_from_slice(cursor),
    })
}
