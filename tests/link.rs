//! Two messengers talking over an in-memory radio pair.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use farmlink::{
    Callbacks, ConnectionState, MemoryRadio, MessengerConfig, NodeId, ReliableMessenger,
    SendOutcome, TelemetryReport,
};

const FIELD: NodeId = 3;
const RELAY: NodeId = 1;
const READING: &[u8] = b"id=03,r=120,v=1.200";

#[derive(Debug, Default)]
struct Log {
    data: Vec<(NodeId, Bytes)>,
    acks: Vec<(NodeId, u16, u8)>,
    drops: Vec<(u16, u8)>,
    peers: Vec<(NodeId, ConnectionState)>,
}

type SharedLog = Arc<Mutex<Log>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn callbacks(log: &SharedLog) -> Callbacks {
    let (d, a, m, p) = (
        Arc::clone(log),
        Arc::clone(log),
        Arc::clone(log),
        Arc::clone(log),
    );
    Callbacks::new()
        .on_data_received(move |src, payload| d.lock().unwrap().data.push((src, payload.clone())))
        .on_ack_received(move |peer, id, attempts| a.lock().unwrap().acks.push((peer, id, attempts)))
        .on_message_dropped(move |id, attempts| m.lock().unwrap().drops.push((id, attempts)))
        .on_peer_state(move |peer, state| p.lock().unwrap().peers.push((peer, state)))
}

struct Node {
    messenger: ReliableMessenger<MemoryRadio>,
    log: SharedLog,
}

fn node(id: NodeId, radio: MemoryRadio, config: MessengerConfig) -> Node {
    let log = SharedLog::default();
    let messenger = ReliableMessenger::new(id, radio, config, callbacks(&log)).unwrap();
    Node { messenger, log }
}

fn pair(config: MessengerConfig) -> (Node, Node) {
    init_tracing();
    let (a, b) = MemoryRadio::pair();
    (node(FIELD, a, config.clone()), node(RELAY, b, config))
}

#[test]
fn test_reading_acknowledged_within_one_tick() {
    let (mut field, mut relay) = pair(MessengerConfig::default());

    field.messenger.tick(0);
    let outcome = field.messenger.send(RELAY, READING, true).unwrap();
    assert_eq!(outcome, SendOutcome::AwaitingAck(1));

    relay.messenger.tick(10);
    {
        let log = relay.log.lock().unwrap();
        assert_eq!(log.data, vec![(FIELD, Bytes::from_static(READING))]);
        assert_eq!(log.peers, vec![(FIELD, ConnectionState::Connected)]);
    }

    field.messenger.tick(20);
    assert_eq!(field.log.lock().unwrap().acks, vec![(RELAY, 1, 1)]);
    assert_eq!(field.messenger.outbox_state(RELAY), None);
    assert!(field.messenger.is_connected(RELAY));
    assert_eq!(field.messenger.last_ack_age_ms(), Some(0));

    let (source, payload) = relay.log.lock().unwrap().data[0].clone();
    let report = TelemetryReport::from_payload(&payload).unwrap();
    assert_eq!(source, FIELD);
    assert_eq!(report.node_id(), Some(FIELD));
    assert_eq!(report.rain_pulses(), Some(120));
    assert!((report.battery_volts().unwrap() - 1.2).abs() < 1e-9);
}

#[test]
fn test_dead_link_retries_then_drops() {
    let (mut field, _relay) = pair(MessengerConfig::default());
    field.messenger.radio().set_outbound_loss(true);

    field.messenger.tick(0);
    field.messenger.send(RELAY, READING, true).unwrap();

    let mut transmissions = vec![0];
    let mut seen = field.messenger.radio().sent().len();
    for now in (10..=4000).step_by(10) {
        field.messenger.tick(now);
        let sent = field.messenger.radio().sent().len();
        if sent > seen {
            transmissions.push(now);
            seen = sent;
        }
    }

    assert_eq!(transmissions, vec![0, 200, 600, 1400]);
    assert_eq!(field.log.lock().unwrap().drops, vec![(1, 4)]);
    assert_eq!(field.messenger.outbox_state(RELAY), None);

    let stats = field.messenger.stats();
    assert_eq!(stats.frames_sent, 4);
    assert_eq!(stats.retries, 3);
    assert_eq!(stats.dropped, 1);

    // Slot is free again.
    assert!(field.messenger.send(RELAY, READING, true).is_ok());
}

#[test]
fn test_lost_ack_is_resent_without_redelivery() {
    let (mut field, mut relay) = pair(MessengerConfig::default());
    relay.messenger.radio().drop_next_outbound(1);

    field.messenger.tick(0);
    field.messenger.send(RELAY, READING, true).unwrap();

    relay.messenger.tick(10);
    field.messenger.tick(20);
    assert!(field.log.lock().unwrap().acks.is_empty());

    field.messenger.tick(200); // retransmission
    relay.messenger.tick(210);
    field.messenger.tick(220);

    assert_eq!(field.log.lock().unwrap().acks, vec![(RELAY, 1, 2)]);
    assert_eq!(relay.log.lock().unwrap().data.len(), 1);
    assert_eq!(relay.messenger.stats().duplicates, 1);
    assert_eq!(relay.messenger.radio().outbound_dropped(), 1);
}

#[test]
fn test_message_id_wraparound_between_nodes() {
    let config = MessengerConfig::new().initial_message_id(u16::MAX);
    let (mut field, mut relay) = pair(config);

    field.messenger.tick(0);
    assert_eq!(
        field.messenger.send(RELAY, &b"a"[..], true).unwrap(),
        SendOutcome::AwaitingAck(u16::MAX)
    );
    relay.messenger.tick(10);
    field.messenger.tick(20);

    assert_eq!(
        field.messenger.send(RELAY, &b"b"[..], true).unwrap(),
        SendOutcome::AwaitingAck(0)
    );
    relay.messenger.tick(30);
    field.messenger.tick(40);

    assert_eq!(
        field.log.lock().unwrap().acks,
        vec![(RELAY, u16::MAX, 1), (RELAY, 0, 1)]
    );
    assert_eq!(relay.log.lock().unwrap().data.len(), 2);
}

#[test]
fn test_silent_peer_disconnects_once() {
    let (mut field, mut relay) = pair(MessengerConfig::default());

    field.messenger.tick(0);
    field.messenger.send(RELAY, READING, false).unwrap();
    relay.messenger.tick(10);

    relay.messenger.tick(5009);
    assert!(relay.messenger.is_connected(FIELD));

    relay.messenger.tick(5011);
    assert!(!relay.messenger.is_connected(FIELD));
    relay.messenger.tick(6000);

    assert_eq!(
        relay.log.lock().unwrap().peers,
        vec![
            (FIELD, ConnectionState::Connected),
            (FIELD, ConnectionState::Disconnected)
        ]
    );
}

#[test]
fn test_force_reconnect_with_acked_pings() {
    let config = MessengerConfig::new().ping_requires_ack(true);
    let (mut field, mut relay) = pair(config);

    field.messenger.tick(0);
    let outcome = field.messenger.force_reconnect(RELAY).unwrap();
    assert!(matches!(outcome, SendOutcome::AwaitingAck(_)));

    relay.messenger.tick(10);
    field.messenger.tick(20);

    let log = field.log.lock().unwrap();
    assert_eq!(log.acks, vec![(RELAY, outcome.message_id(), 1)]);
    assert_eq!(log.peers, vec![(RELAY, ConnectionState::Connected)]);
    assert!(relay.log.lock().unwrap().data.is_empty());
}

#[test]
fn test_force_reconnect_to_silent_relay_reports_disconnect() {
    let (mut field, mut relay) = pair(MessengerConfig::default());

    relay.messenger.tick(0);
    relay.messenger.send(FIELD, &b"hello"[..], false).unwrap();
    field.messenger.tick(10);
    assert!(field.messenger.is_connected(RELAY));

    field.messenger.force_reconnect(RELAY).unwrap();
    for now in (20..=6000).step_by(20) {
        field.messenger.tick(now);
    }

    assert_eq!(
        field.log.lock().unwrap().peers,
        vec![
            (RELAY, ConnectionState::Connected),
            (RELAY, ConnectionState::Disconnected)
        ]
    );
}

#[test]
fn test_refused_transmissions_exhaust_retries() {
    let (mut field, _relay) = pair(MessengerConfig::default());
    field.messenger.radio_mut().set_busy(true);

    field.messenger.tick(0);
    field.messenger.send(RELAY, READING, true).unwrap();
    for now in (10..=4000).step_by(10) {
        field.messenger.tick(now);
    }

    assert_eq!(field.log.lock().unwrap().drops, vec![(1, 4)]);
    assert!(field.messenger.radio().sent().is_empty());

    field.messenger.radio_mut().set_busy(false);
    assert!(field.messenger.send(RELAY, READING, true).is_ok());
}
