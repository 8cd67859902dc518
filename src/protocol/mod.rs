//! Protocol definitions for farmlink radio communication.
//!
//! This module contains the low-level protocol types including:
//! - Radio message encoding/decoding
//! - Message type tags
//! - Wrapping message id arithmetic
//! - Serial framing for USB modems

pub mod codec;
pub mod frame;
pub mod message_type;
pub mod sequence;

pub use codec::{FLAG_REQUIRES_ACK, HEADER_LEN, MAX_FRAME_LEN, MAX_PAYLOAD, decode, encode};
pub use frame::{FRAME_HEADER, FrameDecoder, encode as encode_frame};
pub use message_type::MessageType;
pub use sequence::SequenceCounter;
