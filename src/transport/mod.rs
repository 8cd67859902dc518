//! Radio link abstraction.
//!
//! The messenger talks to the physical radio through [`RadioLink`]. Two
//! implementations ship with the crate: an in-memory link for tests and
//! simulations, and a serial link for USB LoRa modems.

pub mod memory;
pub mod serial;

use bytes::Bytes;

use crate::error::RadioError;

/// Byte-oriented LoRa transceiver.
///
/// Implementations must not block: `transmit` hands a packet to the radio and
/// `poll_receive` returns `None` when nothing is waiting.
pub trait RadioLink {
    /// Queues one packet for transmission.
    fn transmit(&mut self, packet: &[u8]) -> Result<(), RadioError>;

    /// Returns the next received packet, if any.
    fn poll_receive(&mut self) -> Option<Bytes>;

    /// RSSI of the last received packet, in dBm.
    fn read_rssi(&self) -> i16;

    /// SNR of the last received packet, in dB.
    fn read_snr(&self) -> Option<f32> {
        None
    }
}

impl<R: RadioLink + ?Sized> RadioLink for Box<R> {
    fn transmit(&mut self, packet: &[u8]) -> Result<(), RadioError> {
        (**self).transmit(packet)
    }

    fn poll_receive(&mut self) -> Option<Bytes> {
        (**self).poll_receive()
    }

    fn read_rssi(&self) -> i16 {
        (**self).read_rssi()
    }

    fn read_snr(&self) -> Option<f32> {
        (**self).read_snr()
    }
}

pub use memory::MemoryRadio;
pub use serial::{SerialConfig, SerialRadio};
