//! Error types for the farmlink library.

use thiserror::Error;

use crate::types::NodeId;

/// The main error type for farmlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Messenger configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Send was refused by the messenger.
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// The messenger service task is gone.
    #[error("messenger service closed")]
    ServiceClosed,

    /// A confirmed send was abandoned without acknowledgment.
    #[error("message {message_id} dropped after {attempts} attempts")]
    Dropped { message_id: u16, attempts: u8 },

    /// Timed out waiting for an outcome.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Configuration errors, detected when a messenger is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Node id 0 is reserved.
    #[error("node id 0 is reserved")]
    ReservedNodeId,

    /// The broadcast id cannot be used as a node id.
    #[error("broadcast id cannot be used as a node id")]
    BroadcastNodeId,

    /// Maximum payload is zero.
    #[error("max payload must be at least 1 byte")]
    ZeroPayload,

    /// Header plus payload does not fit in a radio packet.
    #[error("frame of {frame} bytes exceeds radio limit of {max} bytes")]
    FrameTooLarge { frame: usize, max: usize },

    /// At least one transmission attempt is required.
    #[error("max attempts must be at least 1")]
    ZeroAttempts,

    /// Retry interval is zero.
    #[error("retry interval must be non-zero")]
    ZeroRetryInterval,

    /// Peer timeout is zero.
    #[error("peer timeout must be non-zero")]
    ZeroPeerTimeout,

    /// At least one frame must be processed per tick.
    #[error("frames per tick must be at least 1")]
    ZeroFramesPerTick,
}

/// Reasons a send is refused.
#[derive(Debug, Error)]
pub enum SendError {
    /// An unacknowledged message to this peer is still outstanding.
    #[error("outbox busy for node {0}")]
    OutboxBusy(NodeId),

    /// Payload exceeds the configured maximum.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Destination cannot be addressed this way.
    #[error("invalid destination {0}")]
    InvalidDestination(NodeId),

    /// The radio refused a fire-and-forget transmission.
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),
}

/// Message encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Payload exceeds the maximum payload size.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Message decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than the fixed header.
    #[error("message truncated: need at least {need} bytes, got {len}")]
    Truncated { len: usize, need: usize },

    /// Unrecognized message type tag.
    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),

    /// Source node id 0 is reserved.
    #[error("reserved source node id 0")]
    InvalidSource,
}

/// Serial frame errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame payload exceeds maximum size.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },
}

/// Errors reported by a [`RadioLink`](crate::transport::RadioLink).
#[derive(Debug, Error)]
pub enum RadioError {
    /// The radio is busy (channel activity or transmit in progress).
    #[error("radio busy")]
    Busy,

    /// Packet is larger than the radio can carry.
    #[error("packet too large: {size} bytes exceeds maximum {max}")]
    PacketTooLarge { size: usize, max: usize },

    /// The link has been closed.
    #[error("radio link closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for farmlink operations.
pub type Result<T> = std::result::Result<T, Error>;
