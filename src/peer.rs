//! Peer liveness tracking.
//!
//! A peer is connected while it has been heard from within the configured
//! timeout. Connection is a pure function of elapsed time; the stored
//! [`ConnectionState`] only records what observers have been told, so each
//! transition is reported exactly once.

use std::collections::HashMap;

use crate::types::{ConnectionState, NodeId, PeerRecord};

/// Last-seen and link quality bookkeeping for every known peer.
#[derive(Debug, Clone)]
pub struct PeerTable {
    peers: HashMap<NodeId, PeerRecord>,
    timeout_ms: u32,
}

impl PeerTable {
    /// Creates an empty table with the given liveness timeout.
    #[must_use]
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            peers: HashMap::new(),
            timeout_ms,
        }
    }

    /// Returns the liveness timeout.
    #[must_use]
    pub const fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Records traffic from `peer` at `now_ms`.
    ///
    /// Creates the record on first contact. Returns true if the peer just
    /// became connected.
    pub fn touch(
        &mut self,
        peer: NodeId,
        now_ms: u32,
        rssi_dbm: Option<i16>,
        snr: Option<f32>,
    ) -> bool {
        let record = self
            .peers
            .entry(peer)
            .or_insert_with(|| PeerRecord::new(now_ms));

        record.last_seen_ms = now_ms;
        record.frames_received = record.frames_received.saturating_add(1);
        if let Some(rssi) = rssi_dbm {
            record.last_rssi_dbm = rssi;
        }
        if let Some(snr) = snr {
            record.last_snr = snr;
        }
        if record.reconnect_pending {
            tracing::debug!("peer {} answered forced reconnect", peer);
            record.reconnect_pending = false;
        }

        if record.connection_state == ConnectionState::Connected {
            false
        } else {
            tracing::info!("peer {} connected", peer);
            record.connection_state = ConnectionState::Connected;
            true
        }
    }

    /// Returns true if `peer` was heard from within the timeout.
    ///
    /// Unknown peers are not connected.
    #[must_use]
    pub fn is_connected(&self, peer: NodeId, now_ms: u32) -> bool {
        self.peers
            .get(&peer)
            .is_some_and(|record| record.silence_ms(now_ms) < self.timeout_ms)
    }

    /// Marks peers silent for longer than the timeout as disconnected.
    ///
    /// Returns the peers that transitioned on this sweep.
    pub fn sweep_timeouts(&mut self, now_ms: u32) -> Vec<NodeId> {
        let timeout_ms = self.timeout_ms;
        let mut disconnected = Vec::new();

        for (&peer, record) in &mut self.peers {
            if record.connection_state != ConnectionState::Disconnected
                && record.silence_ms(now_ms) >= timeout_ms
            {
                tracing::info!(
                    "peer {} disconnected after {}ms of silence",
                    peer,
                    record.silence_ms(now_ms)
                );
                let was_connected = record.connection_state == ConnectionState::Connected;
                record.connection_state = ConnectionState::Disconnected;
                if was_connected {
                    disconnected.push(peer);
                }
            }
        }

        disconnected.sort_unstable();
        disconnected
    }

    /// Flags `peer` as awaiting an answer to a forced reconnect.
    ///
    /// The reported state is left alone, so a connected peer that stays
    /// silent is still reported disconnected once and a peer that answers
    /// is not reported connected twice. Unknown peers are ignored.
    pub fn mark_reconnect_pending(&mut self, peer: NodeId) {
        if let Some(record) = self.peers.get_mut(&peer) {
            record.reconnect_pending = true;
        }
    }

    /// Returns the record for `peer`.
    #[must_use]
    pub fn get(&self, peer: NodeId) -> Option<&PeerRecord> {
        self.peers.get(&peer)
    }

    /// Iterates over all known peers.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &PeerRecord)> {
        self.peers.iter().map(|(&peer, record)| (peer, record))
    }

    /// Returns the number of known peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if no peer has been heard yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_peer_not_connected() {
        let table = PeerTable::new(5000);
        assert!(!table.is_connected(9, 0));
        assert!(table.is_empty());
    }

    #[test]
    fn test_connection_is_function_of_elapsed_time() {
        let mut table = PeerTable::new(5000);
        table.touch(3, 0, None, None);

        assert!(table.is_connected(3, 4999));
        assert!(!table.is_connected(3, 5000));
        assert!(!table.is_connected(3, 5001));
    }

    #[test]
    fn test_touch_reports_connect_edge_once() {
        let mut table = PeerTable::new(5000);
        assert!(table.touch(3, 0, Some(-97), Some(7.5)));
        assert!(!table.touch(3, 100, None, None));

        let record = table.get(3).unwrap();
        assert_eq!(record.connection_state, ConnectionState::Connected);
        assert_eq!(record.last_rssi_dbm, -97);
        assert!((record.last_snr - 7.5).abs() < f32::EPSILON);
        assert_eq!(record.frames_received, 2);
        assert_eq!(record.last_seen_ms, 100);
    }

    #[test]
    fn test_sweep_is_edge_triggered() {
        let mut table = PeerTable::new(5000);
        table.touch(3, 0, None, None);
        table.touch(4, 3000, None, None);

        assert!(table.sweep_timeouts(4999).is_empty());
        assert_eq!(table.sweep_timeouts(5001), vec![3]);
        assert!(table.sweep_timeouts(6000).is_empty());
        assert_eq!(table.sweep_timeouts(9000), vec![4]);

        // Reconnect after silence
        assert!(table.touch(3, 9500, None, None));
        assert_eq!(
            table.get(3).unwrap().connection_state,
            ConnectionState::Connected
        );
    }

    #[test]
    fn test_clock_wraparound() {
        let mut table = PeerTable::new(5000);
        table.touch(3, u32::MAX - 1000, None, None);

        assert!(table.is_connected(3, 2000));
        assert!(table.sweep_timeouts(2000).is_empty());
        assert_eq!(table.sweep_timeouts(4500), vec![3]);
    }

    #[test]
    fn test_reconnect_pending_keeps_reported_state() {
        let mut table = PeerTable::new(5000);
        table.touch(3, 10, Some(-80), None);
        table.mark_reconnect_pending(3);
        table.mark_reconnect_pending(9);

        let record = table.get(3).unwrap();
        assert!(record.reconnect_pending);
        assert_eq!(record.connection_state, ConnectionState::Connected);
        assert_eq!(record.last_seen_ms, 10);
        assert_eq!(record.last_rssi_dbm, -80);
        assert!(table.get(9).is_none());

        // An answer is not a second connect edge.
        assert!(!table.touch(3, 30, None, None));
        assert!(!table.get(3).unwrap().reconnect_pending);
    }

    #[test]
    fn test_silent_peer_after_reconnect_disconnects_once() {
        let mut table = PeerTable::new(5000);
        table.touch(3, 0, None, None);
        table.mark_reconnect_pending(3);

        assert_eq!(table.sweep_timeouts(5000), vec![3]);
        assert!(table.sweep_timeouts(8000).is_empty());
        assert!(table.get(3).unwrap().reconnect_pending);
    }
}
