//! Outbound envelopes and retransmission timing.

use bytes::Bytes;

use crate::types::Message;

/// Lifecycle of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Admitted, every transmission so far refused by the radio.
    Queued,
    /// Transmitted at least once, awaiting acknowledgment.
    InFlight,
    /// Acknowledged by the peer.
    Acked,
    /// Abandoned after the last attempt.
    Dropped,
}

/// A message awaiting transmission or acknowledgment.
#[derive(Debug, Clone)]
pub struct OutboundEnvelope {
    /// The message being delivered.
    pub message: Message,
    /// Transmission attempts so far, including ones the radio refused.
    pub attempts: u8,
    /// Time of the first transmission the radio accepted.
    pub first_sent_at_ms: u32,
    /// Time of the latest attempt.
    pub last_sent_at_ms: u32,
    /// Current lifecycle state.
    pub state: EnvelopeState,
    /// Encoded once so every retry is byte-identical.
    frame: Bytes,
}

impl OutboundEnvelope {
    /// Creates a queued envelope for an encoded message.
    #[must_use]
    pub const fn new(message: Message, frame: Bytes) -> Self {
        Self {
            message,
            attempts: 0,
            first_sent_at_ms: 0,
            last_sent_at_ms: 0,
            state: EnvelopeState::Queued,
            frame,
        }
    }

    /// The encoded radio packet.
    #[must_use]
    pub const fn frame(&self) -> &Bytes {
        &self.frame
    }

    /// Records a transmission at `now_ms`.
    pub fn mark_transmitted(&mut self, now_ms: u32) {
        if self.state == EnvelopeState::Queued {
            self.first_sent_at_ms = now_ms;
            self.state = EnvelopeState::InFlight;
        }
        self.attempts = self.attempts.saturating_add(1);
        self.last_sent_at_ms = now_ms;
    }

    /// Records an attempt at `now_ms` that the radio refused.
    ///
    /// Refusals use up the retry budget like lost transmissions do.
    pub const fn mark_refused(&mut self, now_ms: u32) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_sent_at_ms = now_ms;
    }

    /// Returns true if the backoff delay since the last attempt has passed.
    #[must_use]
    pub fn is_due(&self, now_ms: u32, backoff: &Backoff) -> bool {
        match self.state {
            EnvelopeState::Queued | EnvelopeState::InFlight => {
                self.attempts == 0
                    || now_ms.wrapping_sub(self.last_sent_at_ms) >= backoff.interval_ms(self.attempts)
            }
            EnvelopeState::Acked | EnvelopeState::Dropped => false,
        }
    }

    /// Milliseconds since the first transmission.
    #[must_use]
    pub const fn age_ms(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.first_sent_at_ms)
    }
}

/// Truncated exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u32,
    max_ms: u32,
}

impl Backoff {
    /// Creates a backoff doubling from `base_ms` up to `max_ms`.
    #[must_use]
    pub const fn new(base_ms: u32, max_ms: u32) -> Self {
        Self { base_ms, max_ms }
    }

    /// Wait after the `attempts`-th transmission: `base * 2^(attempts-1)`, capped.
    #[must_use]
    pub fn interval_ms(&self, attempts: u8) -> u32 {
        let exponent = u32::from(attempts.max(1) - 1);
        let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }
}
