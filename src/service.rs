//! Async service running a messenger on a Tokio task.
//!
//! [`MessengerService::spawn`] moves a radio into a background task that
//! ticks the messenger on a fixed interval. Callbacks become [`Event`]s on an
//! [`EventDispatcher`], and [`MessengerHandle`] talks to the task over a
//! command channel:
//!
//! ```text
//!  MessengerHandle ──Command──▶ ┌───────────────────┐ ──▶ RadioLink
//!        ▲                      │ ReliableMessenger │
//!        └───── Event ───────── │   tick every 20ms │ ◀── RadioLink
//!                               └───────────────────┘
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{Error, Result, SendError};
use crate::event::{Event, EventDispatcher, EventFilter, Subscription, wait_on};
use crate::messenger::{Callbacks, MessengerConfig, ReliableMessenger, SendOutcome};
use crate::transport::RadioLink;
use crate::types::{ConnectionState, MessengerStats, NodeId, PeerRecord};

/// Default interval between messenger ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Default capacity of the command and event channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a [`MessengerService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Interval between ticks.
    pub tick_interval: Duration,
    /// Capacity of the command and event channels.
    pub channel_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tick interval.
    #[must_use]
    pub const fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the channel capacity.
    #[must_use]
    pub const fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

enum Command {
    Send {
        destination: NodeId,
        payload: Bytes,
        require_ack: bool,
        reply: oneshot::Sender<std::result::Result<SendOutcome, SendError>>,
    },
    ForceReconnect {
        peer: NodeId,
        reply: oneshot::Sender<std::result::Result<SendOutcome, SendError>>,
    },
    IsConnected {
        peer: NodeId,
        reply: oneshot::Sender<bool>,
    },
    Peers {
        reply: oneshot::Sender<Vec<(NodeId, PeerRecord)>>,
    },
    Stats {
        reply: oneshot::Sender<MessengerStats>,
    },
    Shutdown,
}

/// A messenger running on a background task.
pub struct MessengerService {
    handle: MessengerHandle,
    task: Option<JoinHandle<()>>,
}

impl MessengerService {
    /// Creates a messenger for `node_id` and starts ticking it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<R>(
        node_id: NodeId,
        radio: R,
        config: MessengerConfig,
        service_config: ServiceConfig,
    ) -> Result<Self>
    where
        R: RadioLink + Send + 'static,
    {
        let dispatcher = EventDispatcher::new(service_config.channel_capacity);
        let messenger =
            ReliableMessenger::new(node_id, radio, config, forwarding_callbacks(&dispatcher))?;

        let (command_tx, command_rx) = mpsc::channel(service_config.channel_capacity);
        let task = tokio::spawn(run(messenger, command_rx, service_config.tick_interval));

        tracing::info!(
            "messenger service for node {} started ({:?} ticks)",
            node_id,
            service_config.tick_interval
        );

        Ok(Self {
            handle: MessengerHandle {
                node_id,
                commands: command_tx,
                dispatcher,
            },
            task: Some(task),
        })
    }

    /// Returns a handle to the running messenger.
    #[must_use]
    pub fn handle(&self) -> MessengerHandle {
        self.handle.clone()
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.handle.shutdown().await?;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("messenger task failed: {}", e);
            }
        }
        Ok(())
    }
}

impl Drop for MessengerService {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn forwarding_callbacks(dispatcher: &EventDispatcher) -> Callbacks {
    let (data, ack, dropped, peer) = (
        dispatcher.clone(),
        dispatcher.clone(),
        dispatcher.clone(),
        dispatcher.clone(),
    );

    Callbacks::new()
        .on_data_received(move |source, payload| {
            data.dispatch(Event::DataReceived {
                source,
                payload: payload.clone(),
            });
        })
        .on_ack_received(move |peer, message_id, attempts| {
            ack.dispatch(Event::AckReceived {
                peer,
                message_id,
                attempts,
            });
        })
        .on_message_dropped(move |message_id, attempts| {
            dropped.dispatch(Event::MessageDropped {
                message_id,
                attempts,
            });
        })
        .on_peer_state(move |node, state| match state {
            ConnectionState::Connected => peer.dispatch(Event::PeerConnected(node)),
            ConnectionState::Disconnected => peer.dispatch(Event::PeerDisconnected(node)),
            ConnectionState::Unknown => {}
        })
}

async fn run<R: RadioLink>(
    mut messenger: ReliableMessenger<R>,
    mut commands: mpsc::Receiver<Command>,
    tick_interval: Duration,
) {
    let started = Instant::now();
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                messenger.tick(elapsed_ms(started));
            }
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => handle_command(&mut messenger, command),
            },
        }
    }

    tracing::info!("messenger service for node {} stopped", messenger.node_id());
}

fn elapsed_ms(started: Instant) -> u32 {
    // Wraps after ~49 days; the messenger uses wrapping arithmetic.
    started.elapsed().as_millis() as u32
}

fn handle_command<R: RadioLink>(messenger: &mut ReliableMessenger<R>, command: Command) {
    // A dropped reply receiver means the caller gave up; nothing to do.
    match command {
        Command::Send {
            destination,
            payload,
            require_ack,
            reply,
        } => {
            let _ = reply.send(messenger.send(destination, payload, require_ack));
        }
        Command::ForceReconnect { peer, reply } => {
            let _ = reply.send(messenger.force_reconnect(peer));
        }
        Command::IsConnected { peer, reply } => {
            let _ = reply.send(messenger.is_connected(peer));
        }
        Command::Peers { reply } => {
            let mut peers: Vec<(NodeId, PeerRecord)> = messenger
                .peers()
                .iter()
                .map(|(id, record)| (id, record.clone()))
                .collect();
            peers.sort_unstable_by_key(|(id, _)| *id);
            let _ = reply.send(peers);
        }
        Command::Stats { reply } => {
            let _ = reply.send(messenger.stats());
        }
        Command::Shutdown => {}
    }
}

/// Cloneable handle to a [`MessengerService`].
#[derive(Clone)]
pub struct MessengerHandle {
    node_id: NodeId,
    commands: mpsc::Sender<Command>,
    dispatcher: EventDispatcher,
}

impl MessengerHandle {
    /// This node's id.
    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.node_id
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::ServiceClosed)?;
        response.await.map_err(|_| Error::ServiceClosed)
    }

    /// Sends `payload` to `destination`. See [`ReliableMessenger::send`].
    pub async fn send(
        &self,
        destination: NodeId,
        payload: impl Into<Bytes>,
        require_ack: bool,
    ) -> Result<SendOutcome> {
        let payload = payload.into();
        let outcome = self
            .request(|reply| Command::Send {
                destination,
                payload,
                require_ack,
                reply,
            })
            .await??;
        Ok(outcome)
    }

    /// Sends `payload` with acknowledgment and waits for the outcome.
    ///
    /// Returns the number of transmissions it took. Fails with
    /// [`Error::Dropped`] when the messenger gives up, or [`Error::Timeout`]
    /// when no outcome arrives within `timeout`.
    pub async fn send_confirmed(
        &self,
        destination: NodeId,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<u8> {
        // Subscribe first: the ack may arrive on the very next tick.
        let subscription = self.dispatcher.subscribe();
        let message_id = self.send(destination, payload, true).await?.message_id();

        let filter = EventFilter::outcome(message_id).from_peer(destination);
        match wait_on(subscription, &filter, timeout).await {
            Some(Event::AckReceived { attempts, .. }) => Ok(attempts),
            Some(Event::MessageDropped {
                message_id,
                attempts,
            }) => Err(Error::Dropped {
                message_id,
                attempts,
            }),
            _ => Err(Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Pings `peer` to check it is still there. See [`ReliableMessenger::force_reconnect`].
    pub async fn force_reconnect(&self, peer: NodeId) -> Result<SendOutcome> {
        let outcome = self
            .request(|reply| Command::ForceReconnect { peer, reply })
            .await??;
        Ok(outcome)
    }

    /// Returns true if `peer` has been heard from within the timeout.
    pub async fn is_connected(&self, peer: NodeId) -> Result<bool> {
        self.request(|reply| Command::IsConnected { peer, reply })
            .await
    }

    /// Snapshot of every known peer, ordered by id.
    pub async fn peer_snapshot(&self) -> Result<Vec<(NodeId, PeerRecord)>> {
        self.request(|reply| Command::Peers { reply }).await
    }

    /// Snapshot of the messenger counters.
    pub async fn stats(&self) -> Result<MessengerStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Subscribes to messenger events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Waits for an event matching `filter`.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        self.dispatcher.wait_for(filter, timeout).await
    }

    /// Asks the service task to stop.
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::ServiceClosed)
    }
}

impl std::fmt::Debug for MessengerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessengerHandle")
            .field("node_id", &self.node_id)
            .field("closed", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}
