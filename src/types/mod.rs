//! Data types for farmlink entities.
//!
//! This module contains the core data structures used throughout the library:
//! - Addressed messages and node ids
//! - Peer liveness records
//! - Messenger statistics
//! - Telemetry lines

pub mod message;
pub mod peer;
pub mod stats;
pub mod telemetry;

pub use message::{BROADCAST, Message, NodeId, RESERVED_NODE_ID};
pub use peer::{ConnectionState, PeerRecord};
pub use stats::MessengerStats;
pub use telemetry::{TELEMETRY_TOPIC, TelemetryError, TelemetryReport, TelemetryValue};
