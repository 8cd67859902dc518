//! Event system for async message handling.
//!
//! A [`MessengerService`](crate::service::MessengerService) publishes every
//! messenger callback as an [`Event`] so any number of tasks can observe
//! deliveries, acknowledgments and peer state.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::types::NodeId;

/// Events emitted by a messenger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A message was received for the first time.
    DataReceived { source: NodeId, payload: Bytes },
    /// An outbound message was acknowledged.
    AckReceived {
        peer: NodeId,
        message_id: u16,
        attempts: u8,
    },
    /// An outbound message was abandoned.
    MessageDropped { message_id: u16, attempts: u8 },
    /// A peer started talking.
    PeerConnected(NodeId),
    /// A peer went silent.
    PeerDisconnected(NodeId),
}

/// Discriminant of an [`Event`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::DataReceived`].
    DataReceived,
    /// [`Event::AckReceived`].
    AckReceived,
    /// [`Event::MessageDropped`].
    MessageDropped,
    /// [`Event::PeerConnected`].
    PeerConnected,
    /// [`Event::PeerDisconnected`].
    PeerDisconnected,
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::DataReceived { .. } => EventKind::DataReceived,
            Self::AckReceived { .. } => EventKind::AckReceived,
            Self::MessageDropped { .. } => EventKind::MessageDropped,
            Self::PeerConnected(_) => EventKind::PeerConnected,
            Self::PeerDisconnected(_) => EventKind::PeerDisconnected,
        }
    }

    /// Returns the outbound message id this event concerns, if any.
    #[must_use]
    pub const fn message_id(&self) -> Option<u16> {
        match self {
            Self::AckReceived { message_id, .. } | Self::MessageDropped { message_id, .. } => {
                Some(*message_id)
            }
            _ => None,
        }
    }

    /// Returns the peer this event concerns, if known.
    #[must_use]
    pub const fn peer(&self) -> Option<NodeId> {
        match self {
            Self::DataReceived { source: peer, .. }
            | Self::AckReceived { peer, .. }
            | Self::PeerConnected(peer)
            | Self::PeerDisconnected(peer) => Some(*peer),
            Self::MessageDropped { .. } => None,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed because the
    /// subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("subscriber lagged, skipped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription filter for specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event kinds.
    pub kinds: Option<Vec<EventKind>>,
    /// Filter for a specific outbound message id.
    pub message_id: Option<u16>,
    /// Filter for a specific peer.
    pub peer: Option<NodeId>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds: Some(kinds),
            message_id: None,
            peer: None,
        }
    }

    /// Creates a filter for the final outcome of an outbound message.
    #[must_use]
    pub fn outcome(message_id: u16) -> Self {
        Self {
            kinds: Some(vec![EventKind::AckReceived, EventKind::MessageDropped]),
            message_id: Some(message_id),
            peer: None,
        }
    }

    /// Restricts the filter to events concerning `peer`.
    #[must_use]
    pub const fn from_peer(mut self, peer: NodeId) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }

        if let Some(expected) = self.message_id {
            if event.message_id() != Some(expected) {
                return false;
            }
        }

        // Events with no peer (drops) pass a peer filter.
        if let (Some(expected), Some(peer)) = (self.peer, event.peer()) {
            if peer != expected {
                return false;
            }
        }

        true
    }
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the dispatcher is gone.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let subscription = self.subscribe();
        wait_on(subscription, &filter, timeout).await
    }
}

/// Waits on an existing subscription for an event matching `filter`.
///
/// Subscribe before triggering the event, then wait here, so a fast event
/// cannot be missed.
pub async fn wait_on(
    mut subscription: Subscription,
    filter: &EventFilter,
    timeout: Duration,
) -> Option<Event> {
    tokio::select! {
        biased;
        result = async {
            loop {
                match subscription.recv().await {
                    Some(event) if filter.matches(&event) => return Some(event),
                    Some(_) => {}
                    None => return None,
                }
            }
        } => result,
        () = tokio::time::sleep(timeout) => None,
    }
}
