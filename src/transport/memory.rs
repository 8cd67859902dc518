//! In-memory radio link.
//!
//! [`MemoryRadio::pair`] connects two radios back to back. Each direction can
//! be made lossy to simulate a poor link, and every transmitted packet is
//! recorded for inspection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::error::RadioError;
use crate::protocol::MAX_FRAME_LEN;
use crate::transport::RadioLink;

/// Default RSSI reported for delivered packets.
pub const DEFAULT_RSSI_DBM: i16 = -70;

#[derive(Debug, Default)]
struct Channel {
    queue: VecDeque<Bytes>,
    drop_all: bool,
    drop_next: usize,
    dropped: usize,
}

impl Channel {
    fn deliver(&mut self, packet: Bytes) {
        if self.drop_all {
            self.dropped += 1;
        } else if self.drop_next > 0 {
            self.drop_next -= 1;
            self.dropped += 1;
        } else {
            self.queue.push_back(packet);
        }
    }
}

type SharedChannel = Arc<Mutex<Channel>>;

fn lock(channel: &SharedChannel) -> MutexGuard<'_, Channel> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Radio link backed by in-process queues.
#[derive(Debug)]
pub struct MemoryRadio {
    outbound: SharedChannel,
    inbound: SharedChannel,
    sent: Vec<Bytes>,
    busy: bool,
    rssi_dbm: i16,
    snr: Option<f32>,
}

impl MemoryRadio {
    fn with_channels(outbound: SharedChannel, inbound: SharedChannel) -> Self {
        Self {
            outbound,
            inbound,
            sent: Vec::new(),
            busy: false,
            rssi_dbm: DEFAULT_RSSI_DBM,
            snr: None,
        }
    }

    /// Creates two radios that hear each other.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a_to_b = SharedChannel::default();
        let b_to_a = SharedChannel::default();
        (
            Self::with_channels(Arc::clone(&a_to_b), Arc::clone(&b_to_a)),
            Self::with_channels(b_to_a, a_to_b),
        )
    }

    /// Creates a radio nobody hears. Inbound packets come from [`inject`](Self::inject).
    #[must_use]
    pub fn isolated() -> Self {
        Self::with_channels(SharedChannel::default(), SharedChannel::default())
    }

    /// Places a packet in this radio's receive queue.
    pub fn inject(&self, packet: impl Into<Bytes>) {
        lock(&self.inbound).queue.push_back(packet.into());
    }

    /// Packets transmitted by this radio, including lost ones.
    #[must_use]
    pub fn sent(&self) -> &[Bytes] {
        &self.sent
    }

    /// Takes the transmit log, leaving it empty.
    pub fn take_sent(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.sent)
    }

    /// Loses every packet this radio transmits while `lossy` is set.
    pub fn set_outbound_loss(&self, lossy: bool) {
        lock(&self.outbound).drop_all = lossy;
    }

    /// Loses the next `count` packets this radio transmits.
    pub fn drop_next_outbound(&self, count: usize) {
        lock(&self.outbound).drop_next = count;
    }

    /// Number of transmitted packets that were lost.
    #[must_use]
    pub fn outbound_dropped(&self) -> usize {
        lock(&self.outbound).dropped
    }

    /// Number of packets waiting to be received.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.inbound).queue.len()
    }

    /// Makes `transmit` fail with [`RadioError::Busy`].
    pub const fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Sets the signal quality reported for received packets.
    pub const fn set_signal(&mut self, rssi_dbm: i16, snr: Option<f32>) {
        self.rssi_dbm = rssi_dbm;
        self.snr = snr;
    }
}

impl RadioLink for MemoryRadio {
    fn transmit(&mut self, packet: &[u8]) -> Result<(), RadioError> {
        if self.busy {
            return Err(RadioError::Busy);
        }
        if packet.len() > MAX_FRAME_LEN {
            return Err(RadioError::PacketTooLarge {
                size: packet.len(),
                max: MAX_FRAME_LEN,
            });
        }

        let packet = Bytes::copy_from_slice(packet);
        self.sent.push(packet.clone());
        lock(&self.outbound).deliver(packet);
        Ok(())
    }

    fn poll_receive(&mut self) -> Option<Bytes> {
        lock(&self.inbound).queue.pop_front()
    }

    fn read_rssi(&self) -> i16 {
        self.rssi_dbm
    }

    fn read_snr(&self) -> Option<f32> {
        self.snr
    }
}
