//! Messenger configuration.

use crate::error::ConfigError;
use crate::protocol::{HEADER_LEN, MAX_FRAME_LEN, MAX_PAYLOAD};

/// Default delay before the first retransmission.
pub const DEFAULT_RETRY_INTERVAL_MS: u32 = 200;

/// Default ceiling for the retransmission delay.
pub const DEFAULT_MAX_RETRY_INTERVAL_MS: u32 = 1600;

/// Default number of transmissions before a message is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 4;

/// Default silence after which a peer counts as disconnected.
pub const DEFAULT_PEER_TIMEOUT_MS: u32 = 5000;

/// Default number of received frames processed per tick.
pub const DEFAULT_MAX_FRAMES_PER_TICK: usize = 8;

/// Default first message id.
pub const DEFAULT_INITIAL_MESSAGE_ID: u16 = 1;

/// Configuration for a [`ReliableMessenger`](crate::messenger::ReliableMessenger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessengerConfig {
    /// Largest payload accepted by `send`.
    pub max_payload: usize,
    /// Delay after the first transmission before retrying.
    pub retry_interval_ms: u32,
    /// Upper bound on the backoff delay. Never exceeds `peer_timeout_ms`.
    pub max_retry_interval_ms: u32,
    /// Transmissions per message before it is dropped.
    pub max_attempts: u8,
    /// Silence after which a peer counts as disconnected.
    pub peer_timeout_ms: u32,
    /// Pings request acknowledgment and go through the outbox.
    pub ping_requires_ack: bool,
    /// Received frames processed per tick.
    pub max_frames_per_tick: usize,
    /// First message id handed out.
    pub initial_message_id: u16,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            max_payload: MAX_PAYLOAD,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_retry_interval_ms: DEFAULT_MAX_RETRY_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            ping_requires_ack: false,
            max_frames_per_tick: DEFAULT_MAX_FRAMES_PER_TICK,
            initial_message_id: DEFAULT_INITIAL_MESSAGE_ID,
        }
    }
}

impl MessengerConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum payload size.
    #[must_use]
    pub const fn max_payload(mut self, bytes: usize) -> Self {
        self.max_payload = bytes;
        self
    }

    /// Sets the base retry interval and the backoff ceiling.
    #[must_use]
    pub const fn retry_interval(mut self, base_ms: u32, max_ms: u32) -> Self {
        self.retry_interval_ms = base_ms;
        self.max_retry_interval_ms = max_ms;
        self
    }

    /// Sets the number of transmissions per message.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the peer liveness timeout.
    #[must_use]
    pub const fn peer_timeout(mut self, timeout_ms: u32) -> Self {
        self.peer_timeout_ms = timeout_ms;
        self
    }

    /// Makes pings acknowledged.
    #[must_use]
    pub const fn ping_requires_ack(mut self, enabled: bool) -> Self {
        self.ping_requires_ack = enabled;
        self
    }

    /// Sets how many received frames one tick may process.
    #[must_use]
    pub const fn max_frames_per_tick(mut self, frames: usize) -> Self {
        self.max_frames_per_tick = frames;
        self
    }

    /// Sets the first message id.
    #[must_use]
    pub const fn initial_message_id(mut self, id: u16) -> Self {
        self.initial_message_id = id;
        self
    }

    /// Checks the configuration for programmer errors.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload == 0 {
            return Err(ConfigError::ZeroPayload);
        }
        if HEADER_LEN + self.max_payload > MAX_FRAME_LEN {
            return Err(ConfigError::FrameTooLarge {
                frame: HEADER_LEN + self.max_payload,
                max: MAX_FRAME_LEN,
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::ZeroRetryInterval);
        }
        if self.peer_timeout_ms == 0 {
            return Err(ConfigError::ZeroPeerTimeout);
        }
        if self.max_frames_per_tick == 0 {
            return Err(ConfigError::ZeroFramesPerTick);
        }
        Ok(())
    }

    /// Backoff ceiling clamped to the peer timeout, so retries never outlast
    /// liveness detection.
    #[must_use]
    pub fn effective_max_retry_interval_ms(&self) -> u32 {
        self.max_retry_interval_ms.min(self.peer_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MessengerConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.max_payload, 64);
        assert_eq!(config.max_attempts, 4);
    }

    #[test]
    fn test_builder() {
        let config = MessengerConfig::new()
            .max_payload(32)
            .retry_interval(100, 800)
            .max_attempts(6)
            .peer_timeout(10_000)
            .ping_requires_ack(true)
            .initial_message_id(65535);

        assert_eq!(config.max_payload, 32);
        assert_eq!(config.retry_interval_ms, 100);
        assert_eq!(config.max_retry_interval_ms, 800);
        assert_eq!(config.max_attempts, 6);
        assert!(config.ping_requires_ack);
        assert_eq!(config.initial_message_id, 65535);
    }

    #[test]
    fn test_rejects_frame_larger_than_radio() {
        let config = MessengerConfig::new().max_payload(250);
        assert_eq!(
            config.validate(),
            Err(ConfigError::FrameTooLarge {
                frame: 256,
                max: 255
            })
        );
        assert_eq!(
            MessengerConfig::new().max_payload(249).validate(),
            Ok(())
        );
    }

    #[test]
    fn test_rejects_zero_values() {
        assert_eq!(
            MessengerConfig::new().max_payload(0).validate(),
            Err(ConfigError::ZeroPayload)
        );
        assert_eq!(
            MessengerConfig::new().max_attempts(0).validate(),
            Err(ConfigError::ZeroAttempts)
        );
        assert_eq!(
            MessengerConfig::new().retry_interval(0, 100).validate(),
            Err(ConfigError::ZeroRetryInterval)
        );
        assert_eq!(
            MessengerConfig::new().peer_timeout(0).validate(),
            Err(ConfigError::ZeroPeerTimeout)
        );
    }

    #[test]
    fn test_backoff_ceiling_clamped_to_peer_timeout() {
        let config = MessengerConfig::new()
            .retry_interval(500, 60_000)
            .peer_timeout(3000);
        assert_eq!(config.effective_max_retry_interval_ms(), 3000);
    }
}
