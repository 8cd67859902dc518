//! Serial framing between the host and a USB LoRa modem.
//!
//! Each radio packet crossing the serial line is wrapped as:
//! ```text
//! ┌──────────┬──────────────┬─────────────────┐
//! │  0x3c    │  size (LE)   │  radio packet   │
//! │  1 byte  │   2 bytes    │   size bytes    │
//! └──────────┴──────────────┴─────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::protocol::codec::MAX_FRAME_LEN;

/// Frame header byte.
pub const FRAME_HEADER: u8 = 0x3c;

/// Minimum frame size (header + 2-byte length).
pub const MIN_FRAME_SIZE: usize = 3;

/// Wraps a radio packet in a serial frame.
pub fn encode(packet: &[u8]) -> Result<Bytes, FrameError> {
    if packet.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            size: packet.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut buf = BytesMut::with_capacity(MIN_FRAME_SIZE + packet.len());
    buf.put_u8(FRAME_HEADER);
    buf.put_u16_le(packet.len() as u16);
    buf.put_slice(packet);
    Ok(buf.freeze())
}

/// Frame decoder that handles partial data.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Creates a new frame decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(Some(packet))` if a complete frame was decoded, `Ok(None)`
    /// if more data is needed. Bytes before a header byte are skipped; a header
    /// announcing an oversized packet is dropped and reported so the caller can
    /// log it, and decoding resumes at the next header byte.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        match self.buffer.iter().position(|&b| b == FRAME_HEADER) {
            Some(skip) => self.buffer.advance(skip),
            None => {
                self.buffer.clear();
                return Ok(None);
            }
        }

        if self.buffer.len() < MIN_FRAME_SIZE {
            return Ok(None);
        }

        let length = u16::from_le_bytes([self.buffer[1], self.buffer[2]]) as usize;
        if length > MAX_FRAME_LEN {
            self.buffer.advance(1);
            return Err(FrameError::TooLarge {
                size: length,
                max: MAX_FRAME_LEN,
            });
        }

        if self.buffer.len() < MIN_FRAME_SIZE + length {
            return Ok(None);
        }

        self.buffer.advance(MIN_FRAME_SIZE);
        Ok(Some(self.buffer.split_to(length).freeze()))
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple() {
        let frame = encode(b"hello").unwrap();

        assert_eq!(frame[0], FRAME_HEADER);
        assert_eq!(frame[1], 5);
        assert_eq!(frame[2], 0);
        assert_eq!(&frame[3..], b"hello");
    }

    #[test]
    fn test_encode_too_large() {
        let packet = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            encode(&packet),
            Err(FrameError::TooLarge { size: 256, max: 255 })
        ));
    }

    #[test]
    fn test_decode_partial_frame() {
        let mut decoder = FrameDecoder::new();

        decoder.feed(&[0x3c, 0x05, 0x00, b'h', b'e']);
        assert_eq!(decoder.decode().unwrap(), None);

        decoder.feed(b"llo");
        assert_eq!(
            decoder.decode().unwrap(),
            Some(Bytes::from_static(b"hello"))
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_skips_noise() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x00, 0x11, 0x3c, 0x02, 0x00, b'o', b'k']);

        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"ok")));
    }

    #[test]
    fn test_decode_resyncs_after_oversized_header() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x3c, 0xFF, 0xFF, 0x3c, 0x01, 0x00, b'z']);

        assert!(decoder.decode().is_err());
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"z")));
    }

    #[test]
    fn test_decode_multiple_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[
            0x3c, 0x02, 0x00, b'h', b'i', // first frame
            0x3c, 0x03, 0x00, b'b', b'y', b'e', // second frame
        ]);

        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"hi")));
        assert_eq!(decoder.decode().unwrap(), Some(Bytes::from_static(b"bye")));
        assert_eq!(decoder.decode().unwrap(), None);
    }
}
