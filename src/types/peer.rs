//! Per-peer liveness records.

/// Derived reachability of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No traffic observed yet.
    #[default]
    Unknown,
    /// Heard from within the peer timeout.
    Connected,
    /// Silent for longer than the peer timeout.
    Disconnected,
}

/// Bookkeeping for one remote node.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    /// Time of the last frame received from this peer.
    pub last_seen_ms: u32,
    /// Last state reported to observers.
    pub connection_state: ConnectionState,
    /// RSSI of the last frame, in dBm.
    pub last_rssi_dbm: i16,
    /// SNR of the last frame, in dB.
    pub last_snr: f32,
    /// Frames received from this peer.
    pub frames_received: u32,
    /// A reconnect was forced and the peer has not been heard since.
    pub reconnect_pending: bool,
}

impl PeerRecord {
    /// Creates a record for a peer first heard at `now_ms`.
    #[must_use]
    pub const fn new(now_ms: u32) -> Self {
        Self {
            last_seen_ms: now_ms,
            connection_state: ConnectionState::Unknown,
            last_rssi_dbm: 0,
            last_snr: 0.0,
            frames_received: 0,
            reconnect_pending: false,
        }
    }

    /// Milliseconds since the peer was last heard.
    #[must_use]
    pub const fn silence_ms(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.last_seen_ms)
    }
}
