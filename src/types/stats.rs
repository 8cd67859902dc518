//! Messenger counters.

/// Running totals kept by a messenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessengerStats {
    /// Frames handed to the radio, including retries and acks.
    pub frames_sent: u32,
    /// Retransmissions of unacknowledged messages.
    pub retries: u32,
    /// Outbound messages confirmed by the peer.
    pub acked: u32,
    /// Outbound messages abandoned after the last attempt.
    pub dropped: u32,
    /// Frames received and decoded.
    pub frames_received: u32,
    /// Data frames suppressed as repeats.
    pub duplicates: u32,
    /// Frames that failed to decode.
    pub malformed: u32,
    /// Acks that matched no outstanding message.
    pub unmatched_acks: u32,
    /// Transmit attempts refused by the radio.
    pub radio_errors: u32,
}
