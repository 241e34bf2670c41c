//! Registry ownership and the routing event loop.
//!
//! A single [`Dispatcher`] task owns the three registries (peers, channels,
//! services). Every mutation and every routing decision flows through its
//! event queue, so a route always observes fully-updated registry state.
//! Delivery to a peer is a `try_send` onto that peer's bounded outbound
//! queue and can never block the loop; a full queue disconnects the slow
//! peer instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::{Command, Envelope, PeerId};

use super::peer::{DisconnectReason, Frame, Peer, PeerHandle};
use super::{HubStats, Observer};

/// Unit of work consumed by the dispatcher loop.
#[derive(Debug)]
pub(crate) enum HubEvent {
    /// A handshake completed; the peer's loops are starting.
    Connect {
        /// Metadata for the new peer.
        peer: Peer,
        /// Sending half of the peer's bounded outbound queue.
        outbound: mpsc::Sender<Frame>,
        /// Cancels the peer's connection tasks on unregister.
        cancel: CancellationToken,
    },
    /// An envelope decoded off a peer's transport.
    Inbound {
        /// The sending peer.
        from: PeerId,
        /// The decoded envelope.
        envelope: Envelope,
    },
    /// A peer's transport failed or its lifecycle ended.
    Disconnect {
        /// The peer to unregister.
        peer: PeerId,
        /// When present, delivered best-effort as an `Error` envelope.
        reason: Option<DisconnectReason>,
    },
    /// Read-only snapshot request.
    Stats {
        /// Receives the snapshot.
        reply: oneshot::Sender<HubStats>,
    },
}

/// Owns all registry state; runs as a single task.
pub(crate) struct Dispatcher {
    name: String,
    peers: HashMap<PeerId, PeerHandle>,
    channels: HashMap<String, HashSet<PeerId>>,
    services: HashMap<String, HashSet<PeerId>>,
    observer: Option<Observer>,
}

impl Dispatcher {
    pub(crate) fn new(name: String, observer: Option<Observer>) -> Self {
        Self {
            name,
            peers: HashMap::new(),
            channels: HashMap::new(),
            services: HashMap::new(),
            observer,
        }
    }

    /// Consumes events until the shutdown token fires or every hub handle
    /// is dropped, then unregisters all remaining peers.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::Receiver<HubEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        self.drain();
    }

    pub(crate) fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connect {
                peer,
                outbound,
                cancel,
            } => self.register(peer, outbound, cancel),
            HubEvent::Inbound { from, envelope } => self.route(from, envelope),
            HubEvent::Disconnect { peer, reason } => self.unregister(peer, reason),
            HubEvent::Stats { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn register(&mut self, peer: Peer, outbound: mpsc::Sender<Frame>, cancel: CancellationToken) {
        let id = peer.id;
        tracing::info!(peer = %id, addr = %peer.addr, "peer connected");
        if self
            .peers
            .insert(
                id,
                PeerHandle {
                    peer,
                    outbound,
                    cancel,
                },
            )
            .is_some()
        {
            tracing::error!(peer = %id, "peer id collision on register");
        }
    }

    /// Applies the routing rules to one inbound envelope.
    fn route(&mut self, from: PeerId, mut envelope: Envelope) {
        if !self.peers.contains_key(&from) {
            // Frames raced past a disconnect; nothing to route.
            return;
        }
        envelope.source = Some(from);

        if let Some(dest) = envelope.dest {
            if self.peers.contains_key(&dest) {
                envelope.dest = None;
                self.deliver(dest, envelope.clone());
                self.observe(from, envelope);
            } else {
                tracing::debug!(peer = %from, dest = %dest, "direct destination gone, dropping");
            }
            return;
        }

        if envelope.cmd.requires_name() && envelope.data.is_empty() {
            self.protocol_error(from, DisconnectReason::Malformed);
            return;
        }
        let subject = envelope.subject().map(str::to_owned);

        match envelope.cmd {
            Command::Subscribe => {
                let Some(name) = subject else { return };
                let Some(handle) = self.peers.get_mut(&from) else {
                    return;
                };
                join(&mut self.channels, &mut handle.peer.channels, from, name);
            }
            Command::Unsubscribe => {
                let Some(name) = subject else { return };
                let Some(handle) = self.peers.get_mut(&from) else {
                    return;
                };
                if !leave(&mut self.channels, &mut handle.peer.channels, from, &name) {
                    tracing::error!(peer = %from, channel = %name, "unsubscribe from unknown channel");
                }
            }
            Command::Publish => {
                let Some(name) = subject else { return };
                // Membership is snapshotted up front: delivery may itself
                // unregister a slow member and mutate the channel.
                if let Some(members) = self.channels.get(&name).cloned() {
                    for member in members {
                        self.deliver(member, envelope.clone());
                    }
                }
            }
            Command::Provide => {
                let Some(name) = subject else { return };
                let Some(handle) = self.peers.get_mut(&from) else {
                    return;
                };
                join(&mut self.services, &mut handle.peer.services, from, name);
            }
            Command::Consume => {
                let Some(name) = subject else { return };
                match self.pick_provider(&name) {
                    Some(provider) => {
                        envelope.reply_to = Some(from);
                        if envelope.id.is_none() {
                            envelope.id = Some(Uuid::new_v4());
                        }
                        self.deliver(provider, envelope.clone());
                    }
                    None => {
                        self.deliver(
                            from,
                            Envelope::error(vec!["service not available".to_owned(), name]),
                        );
                    }
                }
            }
            Command::Produce => {
                let Some(name) = subject else { return };
                match self.pick_provider(&name) {
                    Some(provider) => self.deliver(provider, envelope.clone()),
                    None => {
                        self.deliver(
                            from,
                            Envelope::error(vec!["service not available".to_owned(), name]),
                        );
                    }
                }
            }
            Command::Response => {
                let Some(target) = envelope.reply_to.take() else {
                    self.protocol_error(from, DisconnectReason::Malformed);
                    return;
                };
                if self.peers.contains_key(&target) {
                    self.deliver(target, envelope.clone());
                } else {
                    self.protocol_error(from, DisconnectReason::Malformed);
                    return;
                }
            }
            Command::Disconnect => {
                self.unregister(from, None);
                return;
            }
            Command::Data | Command::Error => {
                self.protocol_error(from, DisconnectReason::InvalidCommand);
                return;
            }
        }

        self.observe(from, envelope);
    }

    /// Hands an envelope to the target's bounded outbound queue. A full
    /// queue disconnects the target; the dispatcher never waits on it.
    fn deliver(&mut self, to: PeerId, envelope: Envelope) {
        let Some(handle) = self.peers.get_mut(&to) else {
            return;
        };
        match handle.outbound.try_send(Frame::Envelope(envelope)) {
            Ok(()) => {
                handle.peer.msg_count += 1;
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(peer = %to, "outbound queue full, disconnecting");
                self.unregister(to, Some(DisconnectReason::Unresponsive));
            }
            Err(TrySendError::Closed(_)) => {
                // Writer already gone; its disconnect event is in flight.
            }
        }
    }

    fn protocol_error(&mut self, peer: PeerId, reason: DisconnectReason) {
        self.unregister(peer, Some(reason));
    }

    /// Removes a peer from every registry, informs it of `reason` when
    /// present, and unwinds its connection tasks.
    fn unregister(&mut self, id: PeerId, reason: Option<DisconnectReason>) {
        let Some(handle) = self.peers.remove(&id) else {
            return;
        };
        for name in &handle.peer.channels {
            remove_member(&mut self.channels, name, id);
        }
        for name in &handle.peer.services {
            remove_member(&mut self.services, name, id);
        }
        if let Some(reason) = reason {
            let _ = handle
                .outbound
                .try_send(Frame::Envelope(Envelope::error(vec![reason.to_string()])));
        }
        let _ = handle.outbound.try_send(Frame::Close);
        handle.cancel.cancel();
        tracing::info!(peer = %id, addr = %handle.peer.addr, reason = ?reason, "peer disconnected");
    }

    /// Uniform random pick over a materialized snapshot of the provider
    /// set; repeated calls share no rotation state.
    fn pick_provider(&self, service: &str) -> Option<PeerId> {
        let members = self.services.get(service)?;
        let snapshot: Vec<PeerId> = members.iter().copied().collect();
        if snapshot.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..snapshot.len());
        snapshot.get(index).copied()
    }

    /// Fire-and-forget observer invocation, decoupled from the routing
    /// path by a spawned task.
    fn observe(&self, from: PeerId, envelope: Envelope) {
        let Some(observer) = &self.observer else {
            return;
        };
        let Some(handle) = self.peers.get(&from) else {
            return;
        };
        let observer = Arc::clone(observer);
        let peer = handle.peer.clone();
        tokio::spawn(async move {
            observer(peer, envelope);
        });
    }

    fn snapshot(&self) -> HubStats {
        let mut channels: Vec<String> = self.channels.keys().cloned().collect();
        channels.sort();
        let mut services: Vec<String> = self.services.keys().cloned().collect();
        services.sort();
        let peers: Vec<Peer> = self.peers.values().map(|h| h.peer.clone()).collect();
        HubStats {
            name: self.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            total: peers.len(),
            peers,
            channels,
            services,
            timestamp: chrono::Utc::now(),
        }
    }

    fn drain(&mut self) {
        while let Some(id) = self.peers.keys().next().copied() {
            self.unregister(id, None);
        }
        tracing::info!("dispatcher stopped");
    }
}

/// Adds `id` to the named group, creating it on first join. Idempotent.
fn join(
    groups: &mut HashMap<String, HashSet<PeerId>>,
    joined: &mut HashSet<String>,
    id: PeerId,
    name: String,
) {
    if !joined.insert(name.clone()) {
        return;
    }
    groups.entry(name).or_default().insert(id);
}

/// Removes `id` from the named group, deleting the group once empty.
/// Returns `false` if the peer was never recorded as a member.
fn leave(
    groups: &mut HashMap<String, HashSet<PeerId>>,
    joined: &mut HashSet<String>,
    id: PeerId,
    name: &str,
) -> bool {
    if !joined.remove(name) {
        return false;
    }
    remove_member(groups, name, id);
    true
}

fn remove_member(groups: &mut HashMap<String, HashSet<PeerId>>, name: &str, id: PeerId) {
    let empty = if let Some(members) = groups.get_mut(name) {
        members.remove(&id);
        members.is_empty()
    } else {
        false
    };
    if empty {
        groups.remove(name);
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new("test".to_string(), None)
    }

    fn connect(d: &mut Dispatcher, capacity: usize) -> (PeerId, mpsc::Receiver<Frame>) {
        let id = PeerId::new();
        let (tx, rx) = mpsc::channel(capacity);
        d.handle(HubEvent::Connect {
            peer: Peer::new(id, "test:0"),
            outbound: tx,
            cancel: CancellationToken::new(),
        });
        (id, rx)
    }

    fn route(d: &mut Dispatcher, from: PeerId, envelope: Envelope) {
        d.handle(HubEvent::Inbound { from, envelope });
    }

    fn recv_envelope(rx: &mut mpsc::Receiver<Frame>) -> Envelope {
        match rx.try_recv() {
            Ok(Frame::Envelope(envelope)) => envelope,
            other => panic!("expected envelope frame, got {other:?}"),
        }
    }

    fn assert_empty(rx: &mut mpsc::Receiver<Frame>) {
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn direct_dest_delivers_once_with_source_set() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);
        let (b, mut b_rx) = connect(&mut d, 8);

        let mut envelope = Envelope::new(Command::Data);
        envelope.dest = Some(b);
        envelope.data = vec!["hello".to_string()];
        route(&mut d, a, envelope);

        let received = recv_envelope(&mut b_rx);
        assert_eq!(received.cmd, Command::Data);
        assert_eq!(received.dest, None);
        assert_eq!(received.source, Some(a));
        assert_eq!(received.data, vec!["hello"]);
        assert_empty(&mut b_rx);
        assert_empty(&mut a_rx);
    }

    #[test]
    fn direct_dest_to_unknown_peer_drops_silently() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);

        let mut envelope = Envelope::new(Command::Data);
        envelope.dest = Some(PeerId::new());
        route(&mut d, a, envelope);

        assert!(d.peers.contains_key(&a));
        assert_empty(&mut a_rx);
    }

    #[test]
    fn publish_reaches_all_members_and_only_members() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);
        let (b, mut b_rx) = connect(&mut d, 8);
        let (c, mut c_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));
        route(&mut d, b, Envelope::named(Command::Subscribe, "news", []));

        route(
            &mut d,
            c,
            Envelope::named(Command::Publish, "news", ["update".to_string()]),
        );

        for rx in [&mut a_rx, &mut b_rx] {
            let received = recv_envelope(rx);
            assert_eq!(received.cmd, Command::Publish);
            assert_eq!(received.data, vec!["news", "update"]);
            assert_eq!(received.source, Some(c));
        }
        assert_empty(&mut c_rx);
    }

    #[test]
    fn publish_includes_sender_when_member() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));
        route(
            &mut d,
            a,
            Envelope::named(Command::Publish, "news", ["x".to_string()]),
        );

        assert_eq!(recv_envelope(&mut a_rx).data, vec!["news", "x"]);
    }

    #[test]
    fn publish_to_unknown_channel_is_noop() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);

        route(
            &mut d,
            a,
            Envelope::named(Command::Publish, "ghost", ["x".to_string()]),
        );

        assert!(d.peers.contains_key(&a));
        assert_empty(&mut a_rx);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut d = dispatcher();
        let (a, _a_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));
        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));

        assert_eq!(d.channels.get("news").map(HashSet::len), Some(1));
        let Some(handle) = d.peers.get(&a) else {
            panic!("peer missing");
        };
        assert_eq!(handle.peer.channels.len(), 1);
    }

    #[test]
    fn unsubscribe_removes_membership_and_deletes_empty_channel() {
        let mut d = dispatcher();
        let (a, _a_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));
        assert!(d.channels.contains_key("news"));

        route(&mut d, a, Envelope::named(Command::Unsubscribe, "news", []));
        assert!(!d.channels.contains_key("news"));
    }

    #[test]
    fn unsubscribe_from_unknown_channel_is_logged_noop() {
        let mut d = dispatcher();
        let (a, _a_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Unsubscribe, "ghost", []));

        assert!(d.peers.contains_key(&a));
    }

    #[test]
    fn channel_and_service_namespaces_are_separate() {
        let mut d = dispatcher();
        let (a, _a_rx) = connect(&mut d, 8);
        let (b, _b_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "echo", []));
        route(&mut d, b, Envelope::named(Command::Provide, "echo", []));

        assert_eq!(d.channels.get("echo").map(HashSet::len), Some(1));
        assert_eq!(d.services.get("echo").map(HashSet::len), Some(1));
        assert!(d.channels.get("echo").is_some_and(|m| m.contains(&a)));
        assert!(d.services.get("echo").is_some_and(|m| m.contains(&b)));
    }

    #[test]
    fn consume_routes_to_provider_with_reply_to_and_id() {
        let mut d = dispatcher();
        let (worker, mut worker_rx) = connect(&mut d, 8);
        let (requester, mut requester_rx) = connect(&mut d, 8);

        route(&mut d, worker, Envelope::named(Command::Provide, "echo", []));
        route(
            &mut d,
            requester,
            Envelope::named(Command::Consume, "echo", ["hi".to_string()]),
        );

        let job = recv_envelope(&mut worker_rx);
        assert_eq!(job.cmd, Command::Consume);
        assert_eq!(job.data, vec!["echo", "hi"]);
        assert_eq!(job.reply_to, Some(requester));
        assert!(job.id.is_some());
        assert_empty(&mut requester_rx);
    }

    #[test]
    fn consume_preserves_existing_id() {
        let mut d = dispatcher();
        let (worker, mut worker_rx) = connect(&mut d, 8);
        let (requester, _requester_rx) = connect(&mut d, 8);

        route(&mut d, worker, Envelope::named(Command::Provide, "echo", []));
        let id = Uuid::new_v4();
        let mut request = Envelope::named(Command::Consume, "echo", []);
        request.id = Some(id);
        route(&mut d, requester, request);

        assert_eq!(recv_envelope(&mut worker_rx).id, Some(id));
    }

    #[test]
    fn consume_without_provider_errors_requester_without_disconnect() {
        let mut d = dispatcher();
        let (requester, mut requester_rx) = connect(&mut d, 8);

        route(
            &mut d,
            requester,
            Envelope::named(Command::Consume, "echo", ["hi".to_string()]),
        );

        let error = recv_envelope(&mut requester_rx);
        assert_eq!(error.cmd, Command::Error);
        assert_eq!(error.data, vec!["service not available", "echo"]);
        assert!(d.peers.contains_key(&requester));
    }

    #[test]
    fn work_dispatch_never_picks_a_non_provider() {
        let mut d = dispatcher();
        let (p1, mut p1_rx) = connect(&mut d, 64);
        let (p2, mut p2_rx) = connect(&mut d, 64);
        let (outsider, mut outsider_rx) = connect(&mut d, 64);
        let (requester, _requester_rx) = connect(&mut d, 64);

        route(&mut d, p1, Envelope::named(Command::Provide, "work", []));
        route(&mut d, p2, Envelope::named(Command::Provide, "work", []));

        for _ in 0..20 {
            route(
                &mut d,
                requester,
                Envelope::named(Command::Produce, "work", ["job".to_string()]),
            );
        }

        let mut delivered = 0;
        while let Ok(Frame::Envelope(_)) = p1_rx.try_recv() {
            delivered += 1;
        }
        while let Ok(Frame::Envelope(_)) = p2_rx.try_recv() {
            delivered += 1;
        }
        assert_eq!(delivered, 20);
        assert_empty(&mut outsider_rx);
        let _ = outsider;
    }

    #[test]
    fn produce_is_fire_and_forget() {
        let mut d = dispatcher();
        let (worker, mut worker_rx) = connect(&mut d, 8);
        let (requester, _requester_rx) = connect(&mut d, 8);

        route(&mut d, worker, Envelope::named(Command::Provide, "work", []));
        route(
            &mut d,
            requester,
            Envelope::named(Command::Produce, "work", ["job".to_string()]),
        );

        let job = recv_envelope(&mut worker_rx);
        assert_eq!(job.reply_to, None);
        assert_eq!(job.id, None);
    }

    #[test]
    fn response_routes_to_reply_to_peer_and_clears_it() {
        let mut d = dispatcher();
        let (worker, _worker_rx) = connect(&mut d, 8);
        let (requester, mut requester_rx) = connect(&mut d, 8);

        let mut reply = Envelope::new(Command::Response);
        reply.reply_to = Some(requester);
        reply.data = vec!["done".to_string()];
        route(&mut d, worker, reply);

        let received = recv_envelope(&mut requester_rx);
        assert_eq!(received.cmd, Command::Response);
        assert_eq!(received.reply_to, None);
        assert_eq!(received.source, Some(worker));
    }

    #[test]
    fn response_to_disconnected_peer_disconnects_sender() {
        let mut d = dispatcher();
        let (worker, mut worker_rx) = connect(&mut d, 8);

        let mut reply = Envelope::new(Command::Response);
        reply.reply_to = Some(PeerId::new());
        route(&mut d, worker, reply);

        assert!(!d.peers.contains_key(&worker));
        let error = recv_envelope(&mut worker_rx);
        assert_eq!(error.cmd, Command::Error);
        assert_eq!(error.data, vec![DisconnectReason::Malformed.to_string()]);
        assert!(matches!(worker_rx.try_recv(), Ok(Frame::Close)));
    }

    #[test]
    fn empty_payload_on_publish_is_a_protocol_error() {
        let mut d = dispatcher();
        let (a, _a_rx) = connect(&mut d, 8);
        let (b, mut b_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));
        route(&mut d, b, Envelope::new(Command::Publish));

        assert!(!d.peers.contains_key(&b));
        let error = recv_envelope(&mut b_rx);
        assert_eq!(error.cmd, Command::Error);
        assert!(matches!(b_rx.try_recv(), Ok(Frame::Close)));
        // No broadcast happened.
        let Some(handle) = d.peers.get(&a) else {
            panic!("subscriber missing");
        };
        assert_eq!(handle.peer.msg_count, 0);
    }

    #[test]
    fn data_without_dest_is_an_invalid_command() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);

        let mut envelope = Envelope::new(Command::Data);
        envelope.data = vec!["x".to_string()];
        route(&mut d, a, envelope);

        assert!(!d.peers.contains_key(&a));
        let error = recv_envelope(&mut a_rx);
        assert_eq!(
            error.data,
            vec![DisconnectReason::InvalidCommand.to_string()]
        );
    }

    #[test]
    fn disconnect_command_unregisters_without_error_envelope() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));
        route(&mut d, a, Envelope::new(Command::Disconnect));

        assert!(!d.peers.contains_key(&a));
        assert!(d.channels.is_empty());
        assert!(matches!(a_rx.try_recv(), Ok(Frame::Close)));
    }

    #[test]
    fn unregister_cleans_every_registry() {
        let mut d = dispatcher();
        let (a, _a_rx) = connect(&mut d, 8);
        let (b, _b_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));
        route(&mut d, a, Envelope::named(Command::Subscribe, "sport", []));
        route(&mut d, b, Envelope::named(Command::Subscribe, "news", []));
        route(&mut d, a, Envelope::named(Command::Provide, "echo", []));

        d.handle(HubEvent::Disconnect {
            peer: a,
            reason: None,
        });

        assert!(!d.peers.contains_key(&a));
        assert!(!d.channels.contains_key("sport"));
        assert!(!d.services.contains_key("echo"));
        assert_eq!(d.channels.get("news").map(HashSet::len), Some(1));
    }

    #[test]
    fn full_outbound_queue_disconnects_the_slow_peer() {
        let mut d = dispatcher();
        let (slow, _slow_rx) = connect(&mut d, 1);
        let (sender, mut sender_rx) = connect(&mut d, 8);

        route(&mut d, slow, Envelope::named(Command::Subscribe, "news", []));
        route(
            &mut d,
            sender,
            Envelope::named(Command::Publish, "news", ["one".to_string()]),
        );
        route(
            &mut d,
            sender,
            Envelope::named(Command::Publish, "news", ["two".to_string()]),
        );

        assert!(!d.peers.contains_key(&slow));
        assert!(d.peers.contains_key(&sender));
        assert!(d.channels.is_empty());
        assert_empty(&mut sender_rx);
    }

    #[test]
    fn inbound_from_unknown_peer_is_dropped() {
        let mut d = dispatcher();
        let (a, mut a_rx) = connect(&mut d, 8);

        let mut envelope = Envelope::new(Command::Data);
        envelope.dest = Some(a);
        route(&mut d, PeerId::new(), envelope);

        assert_empty(&mut a_rx);
    }

    #[test]
    fn stats_snapshot_lists_sorted_names() {
        let mut d = dispatcher();
        let (a, _a_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "zebra", []));
        route(&mut d, a, Envelope::named(Command::Subscribe, "alpha", []));
        route(&mut d, a, Envelope::named(Command::Provide, "echo", []));

        let stats = d.snapshot();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.channels, vec!["alpha", "zebra"]);
        assert_eq!(stats.services, vec!["echo"]);
        assert_eq!(stats.name, "test");
    }

    #[tokio::test]
    async fn observer_fires_after_successful_routing() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let observer: Observer = Arc::new(move |peer: Peer, envelope: Envelope| {
            let _ = seen_tx.send((peer.id, envelope.cmd));
        });
        let mut d = Dispatcher::new("test".to_string(), Some(observer));
        let (a, _a_rx) = connect(&mut d, 8);

        route(&mut d, a, Envelope::named(Command::Subscribe, "news", []));

        let Some((peer, cmd)) = seen_rx.recv().await else {
            panic!("observer not invoked");
        };
        assert_eq!(peer, a);
        assert_eq!(cmd, Command::Subscribe);
    }
}
