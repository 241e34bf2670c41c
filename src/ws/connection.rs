//! Per-connection lifecycle: read loop, keepalive ticker, bounded writer.
//!
//! Three tasks per peer: the read loop (owns the stream half and the
//! liveness deadline), the writer (owns the sink half and drains the
//! bounded outbound queue), and the keepalive ticker (pushes probe frames
//! through the writer). All three unwind on the peer's cancellation token,
//! which the dispatcher fires when the peer is unregistered.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::domain::{Envelope, PeerId};
use crate::hub::{DisconnectReason, Frame, Hub, Peer};

/// Runs one upgraded socket as a hub peer until its lifecycle ends.
pub(crate) async fn serve_peer(socket: WebSocket, hub: Hub, addr: String) {
    let peer = Peer::new(PeerId::new(), addr);
    let peer_id = peer.id;
    let cancel = hub.shutdown_token().child_token();
    let (outbound_tx, outbound_rx) = mpsc::channel(hub.queue_capacity());

    hub.register(peer, outbound_tx.clone(), cancel.clone()).await;

    let (ws_tx, ws_rx) = socket.split();
    let writer = tokio::spawn(write_loop(
        ws_tx,
        outbound_rx,
        hub.write_wait(),
        hub.clone(),
        peer_id,
        cancel.clone(),
    ));
    tokio::spawn(keepalive_loop(
        outbound_tx.clone(),
        hub.clone(),
        peer_id,
        hub.ping_period(),
        cancel.clone(),
    ));

    let reason = read_loop(ws_rx, &hub, peer_id, &outbound_tx, hub.ping_wait(), &cancel).await;
    hub.disconnect(peer_id, reason).await;
    let _ = writer.await;
}

/// Reads frames until the transport fails, the liveness deadline expires,
/// or the peer is cancelled. Any inbound frame resets the deadline.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    hub: &Hub,
    peer: PeerId,
    outbound: &mpsc::Sender<Frame>,
    ping_wait: Duration,
    cancel: &CancellationToken,
) -> Option<DisconnectReason> {
    let mut deadline = Box::pin(time::sleep(ping_wait));
    loop {
        tokio::select! {
            () = cancel.cancelled() => return None,
            () = deadline.as_mut() => {
                tracing::debug!(peer = %peer, "liveness deadline expired");
                return None;
            }
            message = ws_rx.next() => {
                deadline.as_mut().reset(Instant::now() + ping_wait);
                match message {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Envelope>(&text) {
                            Ok(envelope) => hub.inbound(peer, envelope).await,
                            Err(error) => {
                                tracing::debug!(peer = %peer, %error, "undecodable envelope");
                                return Some(DisconnectReason::Malformed);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = outbound.try_send(Frame::Pong(payload));
                    }
                    Some(Ok(Message::Pong(_) | Message::Binary(_))) => {}
                    Some(Ok(Message::Close(_))) | None => return None,
                    Some(Err(error)) => {
                        tracing::debug!(peer = %peer, %error, "read failed");
                        return None;
                    }
                }
            }
        }
    }
}

/// Drains the bounded outbound queue onto the sink, applying `write_wait`
/// to every send. Stops on a `Close` frame, queue closure, cancellation,
/// or write failure.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Frame>,
    write_wait: Duration,
    hub: Hub,
    peer: PeerId,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = outbound_rx.recv() => frame.unwrap_or(Frame::Close),
            () = cancel.cancelled() => Frame::Close,
        };
        let message = match frame {
            Frame::Envelope(envelope) => match serde_json::to_string(&envelope) {
                Ok(json) => Message::text(json),
                Err(error) => {
                    tracing::error!(peer = %peer, %error, "failed to encode envelope");
                    continue;
                }
            },
            Frame::Ping => Message::Ping(Bytes::new()),
            Frame::Pong(payload) => Message::Pong(payload),
            Frame::Close => {
                let _ = time::timeout(write_wait, ws_tx.send(Message::Close(None))).await;
                return;
            }
        };
        match time::timeout(write_wait, ws_tx.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::debug!(peer = %peer, %error, "write failed");
                hub.disconnect(peer, None).await;
                return;
            }
            Err(_) => {
                tracing::debug!(peer = %peer, "write timed out");
                hub.disconnect(peer, Some(DisconnectReason::Unresponsive)).await;
                return;
            }
        }
    }
}

/// Emits a liveness probe every `period` through the peer's outbound
/// queue. A probe that cannot even be queued means the peer is wedged.
async fn keepalive_loop(
    outbound: mpsc::Sender<Frame>,
    hub: Hub,
    peer: PeerId,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => match outbound.try_send(Frame::Ping) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    hub.disconnect(peer, Some(DisconnectReason::Unresponsive)).await;
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return,
            },
        }
    }
}
