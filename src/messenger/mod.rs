//! Reliable messaging over a [`RadioLink`].
//!
//! [`ReliableMessenger`] turns a lossy radio into acknowledged delivery:
//!
//! - Each destination has a single outbox slot. A message that requires an
//!   acknowledgment occupies the slot until it is acked or dropped, and
//!   `send` to a busy slot fails instead of queueing.
//! - Unacknowledged messages are retransmitted with exponential backoff and
//!   dropped once `max_attempts` attempts went unanswered. An attempt the
//!   radio refuses counts too.
//! - Received data that asks for an acknowledgment is always acked, even when
//!   it is a repeat, but each message is delivered to the application once.
//! - Peer liveness is derived from received traffic.
//!
//! The messenger has no timer of its own. The host calls [`tick`] at a bounded
//! interval (50ms or less); receive processing, retries and timeout detection
//! all happen inside that call.
//!
//! [`tick`]: ReliableMessenger::tick

pub mod callbacks;
pub mod config;
pub mod outbox;

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{Error, RadioError, SendError};
use crate::peer::PeerTable;
use crate::protocol::{MessageType, SequenceCounter, codec, sequence};
use crate::transport::RadioLink;
use crate::types::{
    BROADCAST, ConnectionState, Message, MessengerStats, NodeId, RESERVED_NODE_ID,
};

pub use callbacks::Callbacks;
pub use config::MessengerConfig;
pub use outbox::{Backoff, EnvelopeState, OutboundEnvelope};

/// Result of a successful `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the radio once; no delivery confirmation will follow.
    Transmitted(u16),
    /// Occupying the destination's outbox slot until acked or dropped.
    AwaitingAck(u16),
}

impl SendOutcome {
    /// The id assigned to the message.
    #[must_use]
    pub const fn message_id(self) -> u16 {
        match self {
            Self::Transmitted(id) | Self::AwaitingAck(id) => id,
        }
    }
}

/// Acknowledged messaging state machine for one node.
pub struct ReliableMessenger<R> {
    node_id: NodeId,
    radio: R,
    config: MessengerConfig,
    callbacks: Callbacks,
    backoff: Backoff,
    sequence: SequenceCounter,
    peers: PeerTable,
    outbox: HashMap<NodeId, OutboundEnvelope>,
    last_delivered: HashMap<NodeId, u16>,
    now_ms: u32,
    last_rssi_dbm: i16,
    last_ack_at_ms: Option<u32>,
    stats: MessengerStats,
}

impl<R: RadioLink> ReliableMessenger<R> {
    /// Creates a messenger for `node_id` driving `radio`.
    ///
    /// Fails if the node id is reserved or the configuration is invalid.
    pub fn new(
        node_id: NodeId,
        radio: R,
        config: MessengerConfig,
        callbacks: Callbacks,
    ) -> Result<Self, Error> {
        if node_id == RESERVED_NODE_ID {
            return Err(crate::error::ConfigError::ReservedNodeId.into());
        }
        if node_id == BROADCAST {
            return Err(crate::error::ConfigError::BroadcastNodeId.into());
        }
        config.validate()?;

        tracing::debug!("messenger for node {} created: {:?}", node_id, config);

        Ok(Self {
            node_id,
            radio,
            backoff: Backoff::new(
                config.retry_interval_ms,
                config.effective_max_retry_interval_ms(),
            ),
            sequence: SequenceCounter::new(config.initial_message_id),
            peers: PeerTable::new(config.peer_timeout_ms),
            config,
            callbacks,
            outbox: HashMap::new(),
            last_delivered: HashMap::new(),
            now_ms: 0,
            last_rssi_dbm: 0,
            last_ack_at_ms: None,
            stats: MessengerStats::default(),
        })
    }

    // ==================== Sending ====================

    /// Sends `payload` to `destination`.
    ///
    /// Without `require_ack` the message is transmitted once and reported as
    /// [`SendOutcome::Transmitted`]. With `require_ack` it takes the
    /// destination's outbox slot and is retried from [`tick`](Self::tick);
    /// the outcome arrives through the ack or drop callback.
    pub fn send(
        &mut self,
        destination: NodeId,
        payload: impl Into<Bytes>,
        require_ack: bool,
    ) -> Result<SendOutcome, SendError> {
        let payload = payload.into();

        self.check_destination(destination, require_ack)?;
        if payload.len() > self.config.max_payload {
            return Err(SendError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload,
            });
        }
        if require_ack && self.outbox.contains_key(&destination) {
            return Err(SendError::OutboxBusy(destination));
        }

        let message_id = self.sequence.next_id();
        let message = Message::data(self.node_id, destination, message_id, payload, require_ack);

        if require_ack {
            self.admit(message)?;
            Ok(SendOutcome::AwaitingAck(message_id))
        } else {
            self.send_once(&message)?;
            Ok(SendOutcome::Transmitted(message_id))
        }
    }

    /// Pings `peer` right away to check that it is still there.
    ///
    /// The peer's reported connection state is kept, so connect and
    /// disconnect callbacks still fire once per transition. With
    /// `ping_requires_ack` and a free outbox slot the ping is retried like
    /// data; otherwise it is sent once. An in-flight message to the peer is
    /// left alone.
    pub fn force_reconnect(&mut self, peer: NodeId) -> Result<SendOutcome, SendError> {
        self.check_destination(peer, false)?;
        self.peers.mark_reconnect_pending(peer);

        let message_id = self.sequence.next_id();
        tracing::info!("forcing reconnect to peer {}", peer);

        if self.config.ping_requires_ack && peer != BROADCAST && !self.outbox.contains_key(&peer) {
            self.admit(Message::ping(self.node_id, peer, message_id, true))?;
            Ok(SendOutcome::AwaitingAck(message_id))
        } else {
            self.send_once(&Message::ping(self.node_id, peer, message_id, false))?;
            Ok(SendOutcome::Transmitted(message_id))
        }
    }

    fn check_destination(&self, destination: NodeId, require_ack: bool) -> Result<(), SendError> {
        if destination == RESERVED_NODE_ID
            || destination == self.node_id
            || (require_ack && destination == BROADCAST)
        {
            return Err(SendError::InvalidDestination(destination));
        }
        Ok(())
    }

    /// Places a message in its destination's outbox slot and makes the first
    /// attempt. A refused attempt leaves it queued and backing off.
    fn admit(&mut self, message: Message) -> Result<(), SendError> {
        let frame = self.encode(&message)?;
        let destination = message.destination;
        self.outbox
            .insert(destination, OutboundEnvelope::new(message, frame));
        self.attempt(destination, self.now_ms);
        Ok(())
    }

    fn send_once(&mut self, message: &Message) -> Result<(), SendError> {
        let frame = self.encode(message)?;
        self.transmit(&frame)?;
        Ok(())
    }

    fn encode(&self, message: &Message) -> Result<Bytes, SendError> {
        codec::encode(message, self.config.max_payload).map_err(|e| match e {
            crate::error::EncodeError::PayloadTooLarge { size, max } => {
                SendError::PayloadTooLarge { size, max }
            }
        })
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        tracing::trace!("tx {} bytes: {}", frame.len(), hex::encode(frame));
        match self.radio.transmit(frame) {
            Ok(()) => {
                self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);
                Ok(())
            }
            Err(e) => {
                self.stats.radio_errors = self.stats.radio_errors.wrapping_add(1);
                Err(e)
            }
        }
    }

    // ==================== Scheduler ====================

    /// Advances the protocol to `now_ms`.
    ///
    /// Processes received frames, retransmits or drops overdue messages and
    /// detects silent peers. Never blocks.
    pub fn tick(&mut self, now_ms: u32) {
        self.now_ms = now_ms;
        self.process_inbound(now_ms);
        self.service_outbox(now_ms);

        for peer in self.peers.sweep_timeouts(now_ms) {
            self.callbacks
                .peer_state(peer, ConnectionState::Disconnected);
        }
    }

    fn process_inbound(&mut self, now_ms: u32) {
        for _ in 0..self.config.max_frames_per_tick {
            let Some(packet) = self.radio.poll_receive() else {
                break;
            };
            self.handle_packet(&packet, now_ms);
        }
    }

    fn service_outbox(&mut self, now_ms: u32) {
        let mut destinations: Vec<NodeId> = self.outbox.keys().copied().collect();
        destinations.sort_unstable();

        for destination in destinations {
            let Some(envelope) = self.outbox.get(&destination) else {
                continue;
            };

            match envelope.state {
                EnvelopeState::Queued | EnvelopeState::InFlight => {
                    if !envelope.is_due(now_ms, &self.backoff) {
                        continue;
                    }
                    if envelope.attempts >= self.config.max_attempts {
                        self.drop_envelope(destination);
                    } else {
                        self.attempt(destination, now_ms);
                    }
                }
                EnvelopeState::Acked | EnvelopeState::Dropped => {
                    self.outbox.remove(&destination);
                }
            }
        }
    }

    /// Transmits the envelope in `destination`'s slot, counting the attempt
    /// whether or not the radio accepts it.
    fn attempt(&mut self, destination: NodeId, now_ms: u32) {
        let Some(frame) = self.outbox.get(&destination).map(|e| e.frame().clone()) else {
            return;
        };
        let result = self.transmit(&frame);

        let Some(envelope) = self.outbox.get_mut(&destination) else {
            return;
        };
        let retry = envelope.attempts > 0;
        match result {
            Ok(()) => {
                envelope.mark_transmitted(now_ms);
                if retry {
                    self.stats.retries = self.stats.retries.wrapping_add(1);
                    tracing::debug!(
                        "retransmitted message {} to {} (attempt {})",
                        envelope.message.message_id,
                        destination,
                        envelope.attempts
                    );
                }
            }
            Err(e) => {
                envelope.mark_refused(now_ms);
                tracing::warn!(
                    "attempt {} of message {} to {} refused: {}",
                    envelope.attempts,
                    envelope.message.message_id,
                    destination,
                    e
                );
            }
        }
    }

    fn drop_envelope(&mut self, destination: NodeId) {
        let Some(mut envelope) = self.outbox.remove(&destination) else {
            return;
        };
        envelope.state = EnvelopeState::Dropped;
        self.stats.dropped = self.stats.dropped.wrapping_add(1);

        tracing::warn!(
            "message {} to {} dropped after {} attempts",
            envelope.message.message_id,
            destination,
            envelope.attempts
        );
        self.callbacks
            .message_dropped(envelope.message.message_id, envelope.attempts);
    }

    // ==================== Receiving ====================

    fn handle_packet(&mut self, packet: &[u8], now_ms: u32) {
        tracing::trace!("rx {} bytes: {}", packet.len(), hex::encode(packet));

        let message = match codec::decode(packet) {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed = self.stats.malformed.wrapping_add(1);
                tracing::warn!("discarding malformed frame: {}", e);
                return;
            }
        };
        self.stats.frames_received = self.stats.frames_received.wrapping_add(1);

        if message.source == self.node_id {
            tracing::debug!("ignoring frame carrying our own node id");
            return;
        }

        let rssi = self.radio.read_rssi();
        self.last_rssi_dbm = rssi;
        if self
            .peers
            .touch(message.source, now_ms, Some(rssi), self.radio.read_snr())
        {
            self.callbacks
                .peer_state(message.source, ConnectionState::Connected);
        }

        if !message.is_for(self.node_id) {
            tracing::trace!(
                "frame from {} for {} is not for us",
                message.source,
                message.destination
            );
            return;
        }

        match message.kind {
            MessageType::Data => self.handle_data(&message),
            MessageType::Ack => self.handle_ack(&message, now_ms),
            MessageType::Ping => self.handle_ping(&message),
        }
    }

    fn handle_data(&mut self, message: &Message) {
        if message.requires_ack && !message.is_broadcast() {
            self.send_ack(message.source, message.message_id);
        }

        if self.last_delivered.get(&message.source) == Some(&message.message_id) {
            self.stats.duplicates = self.stats.duplicates.wrapping_add(1);
            tracing::debug!(
                "suppressing duplicate message {} from {}",
                message.message_id,
                message.source
            );
            return;
        }

        self.last_delivered
            .insert(message.source, message.message_id);
        self.callbacks
            .data_received(message.source, &message.payload);
    }

    fn handle_ack(&mut self, ack: &Message, now_ms: u32) {
        let peer = ack.source;
        let acked_id = ack.message_id;

        let matched = self.outbox.get(&peer).is_some_and(|envelope| {
            envelope.state == EnvelopeState::InFlight && envelope.message.message_id == acked_id
        });

        if !matched {
            self.stats.unmatched_acks = self.stats.unmatched_acks.wrapping_add(1);
            match self.outbox.get(&peer) {
                Some(envelope) if sequence::is_older(acked_id, envelope.message.message_id) => {
                    tracing::debug!(
                        "ignoring stale ack {} from {} (outstanding {})",
                        acked_id,
                        peer,
                        envelope.message.message_id
                    );
                }
                Some(envelope) if sequence::is_newer(acked_id, envelope.message.message_id) => {
                    tracing::warn!(
                        "ignoring ack {} from {} ahead of outstanding {}",
                        acked_id,
                        peer,
                        envelope.message.message_id
                    );
                }
                _ => tracing::debug!("ignoring unmatched ack {} from {}", acked_id, peer),
            }
            return;
        }

        let Some(mut envelope) = self.outbox.remove(&peer) else {
            return;
        };
        envelope.state = EnvelopeState::Acked;
        self.stats.acked = self.stats.acked.wrapping_add(1);
        self.last_ack_at_ms = Some(now_ms);

        tracing::debug!(
            "message {} acked by {} after {} attempts ({}ms)",
            acked_id,
            peer,
            envelope.attempts,
            envelope.age_ms(now_ms)
        );
        self.callbacks
            .ack_received(peer, acked_id, envelope.attempts);
    }

    fn handle_ping(&mut self, ping: &Message) {
        if ping.requires_ack && self.config.ping_requires_ack && !ping.is_broadcast() {
            self.send_ack(ping.source, ping.message_id);
        }
    }

    fn send_ack(&mut self, peer: NodeId, message_id: u16) {
        let ack = Message::ack(self.node_id, peer, message_id);
        if let Err(e) = self.send_once(&ack) {
            tracing::warn!("failed to ack message {} from {}: {}", message_id, peer, e);
        }
    }

    // ==================== Queries ====================

    /// This node's id.
    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Time of the last tick.
    #[must_use]
    pub const fn now_ms(&self) -> u32 {
        self.now_ms
    }

    /// Returns true if `peer` was heard within the timeout as of the last tick.
    #[must_use]
    pub fn is_connected(&self, peer: NodeId) -> bool {
        self.peers.is_connected(peer, self.now_ms)
    }

    /// RSSI of the last received frame, in dBm.
    #[must_use]
    pub const fn last_rssi_dbm(&self) -> i16 {
        self.last_rssi_dbm
    }

    /// Milliseconds since any message was acknowledged, as of the last tick.
    ///
    /// A host watchdog can call [`force_reconnect`](Self::force_reconnect) when
    /// this grows too large.
    #[must_use]
    pub fn last_ack_age_ms(&self) -> Option<u32> {
        self.last_ack_at_ms
            .map(|at| self.now_ms.wrapping_sub(at))
    }

    /// State of the outbox slot for `peer`, if occupied.
    #[must_use]
    pub fn outbox_state(&self, peer: NodeId) -> Option<EnvelopeState> {
        self.outbox.get(&peer).map(|envelope| envelope.state)
    }

    /// The envelope occupying `peer`'s outbox slot.
    #[must_use]
    pub fn envelope(&self, peer: NodeId) -> Option<&OutboundEnvelope> {
        self.outbox.get(&peer)
    }

    /// Known peers.
    #[must_use]
    pub const fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Running counters.
    #[must_use]
    pub const fn stats(&self) -> MessengerStats {
        self.stats
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MessengerConfig {
        &self.config
    }

    /// The underlying radio.
    #[must_use]
    pub const fn radio(&self) -> &R {
        &self.radio
    }

    /// The underlying radio, mutably.
    pub const fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }
}

impl<R> std::fmt::Debug for ReliableMessenger<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliableMessenger")
            .field("node_id", &self.node_id)
            .field("now_ms", &self.now_ms)
            .field("outbox", &self.outbox.len())
            .field("peers", &self.peers.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
