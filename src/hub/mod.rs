//! Hub core: the dispatcher task and its public handle.
//!
//! [`Hub`] is a cheaply-cloneable handle over the dispatcher's event queue.
//! Constructing one spawns the dispatcher task; every clone feeds the same
//! registries. All registry mutation happens inside the dispatcher, so no
//! locks guard the peer, channel, or service maps.

mod dispatcher;
mod peer;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::domain::{Envelope, PeerId};
use crate::error::HubError;

use dispatcher::{Dispatcher, HubEvent};
pub(crate) use peer::Frame;
pub use peer::{DisconnectReason, Peer};

/// Telemetry callback invoked with the sending peer and the envelope after
/// every successful routing decision.
///
/// Runs on a spawned task: it cannot block or fail routing, and it is never
/// relied upon for correctness.
pub type Observer = Arc<dyn Fn(Peer, Envelope) + Send + Sync + 'static>;

/// Read-only snapshot of the hub's registries.
///
/// A copy, never a live view: mutating it affects nothing.
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    /// Hub name from configuration.
    pub name: String,
    /// Crate version serving this hub.
    pub version: String,
    /// Total connected peers.
    pub total: usize,
    /// Per-peer metadata.
    pub peers: Vec<Peer>,
    /// Active channel names, sorted.
    pub channels: Vec<String>,
    /// Active service names, sorted.
    pub services: Vec<String>,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// Handle to a running hub.
///
/// Clones share the same dispatcher; dropping the last clone stops it.
#[derive(Debug, Clone)]
pub struct Hub {
    events: mpsc::Sender<HubEvent>,
    shutdown: CancellationToken,
    ping_wait: Duration,
    write_wait: Duration,
    queue_capacity: usize,
}

impl Hub {
    /// Spawns a dispatcher task and returns a handle to it.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(config: &HubConfig) -> Self {
        Self::spawn(config, None)
    }

    /// Like [`Hub::new`] with a telemetry [`Observer`] attached.
    #[must_use]
    pub fn with_observer(config: &HubConfig, observer: Observer) -> Self {
        Self::spawn(config, Some(observer))
    }

    fn spawn(config: &HubConfig, observer: Option<Observer>) -> Self {
        let (events, events_rx) = mpsc::channel(config.event_queue_capacity);
        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(config.hub_name.clone(), observer);
        tokio::spawn(dispatcher.run(events_rx, shutdown.clone()));
        Self {
            events,
            shutdown,
            ping_wait: config.ping_wait,
            write_wait: config.write_wait,
            queue_capacity: config.outbound_queue_capacity,
        }
    }

    /// Registers a freshly-handshaken peer with the dispatcher.
    pub(crate) async fn register(
        &self,
        peer: Peer,
        outbound: mpsc::Sender<Frame>,
        cancel: CancellationToken,
    ) {
        let _ = self
            .events
            .send(HubEvent::Connect {
                peer,
                outbound,
                cancel,
            })
            .await;
    }

    /// Forwards an envelope decoded off a peer's transport.
    pub(crate) async fn inbound(&self, from: PeerId, envelope: Envelope) {
        let _ = self.events.send(HubEvent::Inbound { from, envelope }).await;
    }

    /// Unregisters a peer; `reason`, when present, is delivered best-effort
    /// as an `Error` envelope before the transport closes.
    pub async fn disconnect(&self, peer: PeerId, reason: Option<DisconnectReason>) {
        let _ = self.events.send(HubEvent::Disconnect { peer, reason }).await;
    }

    /// Requests a registry snapshot from the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Shutdown`] once the dispatcher has stopped.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(HubEvent::Stats { reply })
            .await
            .map_err(|_| HubError::Shutdown)?;
        response.await.map_err(|_| HubError::Shutdown)
    }

    /// Signals the dispatcher and every peer task to unwind. In-flight
    /// sends are abandoned, not delivered.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Token cancelled by [`Hub::shutdown`]; peer tasks derive child tokens
    /// from it.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Liveness deadline for peer read loops.
    pub(crate) fn ping_wait(&self) -> Duration {
        self.ping_wait
    }

    /// Interval between outbound liveness probes.
    pub(crate) fn ping_period(&self) -> Duration {
        (self.ping_wait * 9) / 10
    }

    /// Timeout applied to each outbound WebSocket write.
    pub(crate) fn write_wait(&self) -> Duration {
        self.write_wait
    }

    /// Capacity of each peer's bounded outbound queue.
    pub(crate) fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}
