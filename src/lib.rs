//! # farmlink
//!
//! Reliable, acknowledged messaging over LoRa for farm telemetry nodes.
//!
//! Field nodes report readings such as rain gauge pulses and battery voltage
//! to a relay over a lossy, half-duplex radio link. This library provides the
//! messaging core shared by both ends.
//!
//! ## Features
//!
//! - Compact 6-byte header radio codec
//! - Per-peer outbox with exponential-backoff retransmission
//! - Duplicate suppression with unconditional re-acknowledgment
//! - Peer liveness tracking with connect/disconnect notifications
//! - In-memory and USB serial radio links
//! - Async service with an event stream, built on Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use farmlink::{MemoryRadio, MessengerConfig, MessengerService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), farmlink::Error> {
//!     let (field_radio, relay_radio) = MemoryRadio::pair();
//!
//!     let field =
//!         MessengerService::spawn(3, field_radio, MessengerConfig::new(), ServiceConfig::new())?;
//!     let _relay =
//!         MessengerService::spawn(1, relay_radio, MessengerConfig::new(), ServiceConfig::new())?;
//!
//!     let attempts = field
//!         .handle()
//!         .send_confirmed(1, &b"id=3,r=120,v=1.200"[..], Duration::from_secs(5))
//!         .await?;
//!     println!("delivered after {attempts} transmission(s)");
//!
//!     field.shutdown().await
//! }
//! ```
//!
//! Hosts without Tokio drive a [`ReliableMessenger`] directly by calling
//! [`tick`](ReliableMessenger::tick) every few milliseconds.
//!
//! ## Architecture
//!
//! - [`protocol`] - Radio codec, message ids and serial framing
//! - [`types`] - Messages, peer records, statistics and telemetry lines
//! - [`peer`] - Peer liveness table
//! - [`messenger`] - The reliable messaging state machine
//! - [`transport`] - Radio link implementations (memory, USB/Serial)
//! - [`event`] - Async event system
//! - [`service`] - Tokio task running a messenger

pub mod error;
pub mod event;
pub mod messenger;
pub mod peer;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use error::{
    ConfigError, DecodeError, EncodeError, Error, FrameError, RadioError, Result, SendError,
};
pub use event::{Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use messenger::{Callbacks, EnvelopeState, MessengerConfig, ReliableMessenger, SendOutcome};
pub use peer::PeerTable;
pub use protocol::{MAX_PAYLOAD, MessageType};
pub use service::{MessengerHandle, MessengerService, ServiceConfig};
pub use transport::{MemoryRadio, RadioLink, SerialConfig, SerialRadio, serial::list_ports};
pub use types::{
    BROADCAST, ConnectionState, Message, MessengerStats, NodeId, PeerRecord, TelemetryReport,
    TelemetryValue,
};
