//! Outbound connector: the peer lifecycle over a dialed connection.
//!
//! [`Client`] speaks the same envelope protocol as a hub-side peer — read
//! loop, liveness deadline, ping ticker, bounded outbound queue — but in
//! place of registries it hands every inbound envelope to one local
//! handler callback. [`ClientSender`] builds and enqueues the command
//! envelopes.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::domain::{Command, Envelope, PeerId};
use crate::error::HubError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection timing knobs for [`Client`]; mirrors the hub-side defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Liveness deadline for inbound frames.
    pub ping_wait: Duration,
    /// Timeout applied to each outbound write.
    pub write_wait: Duration,
    /// Capacity of the outbound envelope queue.
    pub outbound_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ping_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            outbound_queue_capacity: 100,
        }
    }
}

/// A connected client-side peer.
///
/// Obtain a [`ClientSender`] before calling [`Client::run`]; the run loop
/// consumes the client and drives the connection until the hub disconnects
/// it or the transport fails.
#[derive(Debug)]
pub struct Client {
    stream: WsStream,
    config: ClientConfig,
    sender: ClientSender,
    outbound_rx: mpsc::Receiver<Envelope>,
}

impl Client {
    /// Dials the hub's `/ws` endpoint (e.g. `ws://127.0.0.1:3000/ws`).
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Transport`] when the dial or upgrade fails.
    pub async fn connect(url: &str, config: ClientConfig) -> Result<Self, HubError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|error| HubError::Transport(error.to_string()))?;
        let (outbound, outbound_rx) = mpsc::channel(config.outbound_queue_capacity);
        Ok(Self {
            stream,
            config,
            sender: ClientSender { outbound },
            outbound_rx,
        })
    }

    /// Returns a cloneable handle for enqueueing outbound envelopes.
    #[must_use]
    pub fn sender(&self) -> ClientSender {
        self.sender.clone()
    }

    /// Drives the connection, invoking `handler` for every inbound
    /// envelope except the hub's `Disconnect` command.
    ///
    /// Returns `Ok(())` when the hub closes the connection normally.
    ///
    /// # Errors
    ///
    /// [`HubError::Disconnected`] when the hub sends a `Disconnect`
    /// command, [`HubError::Malformed`] on an undecodable frame, and
    /// [`HubError::Transport`] on read/write/deadline failures.
    pub async fn run<F>(self, mut handler: F) -> Result<(), HubError>
    where
        F: FnMut(&ClientSender, Envelope),
    {
        let Client {
            stream,
            config,
            sender,
            mut outbound_rx,
        } = self;
        let ping_period = (config.ping_wait * 9) / 10;
        let mut ticker = time::interval_at(Instant::now() + ping_period, ping_period);
        let mut deadline = Box::pin(time::sleep(config.ping_wait));
        let (mut ws_tx, mut ws_rx) = stream.split();

        loop {
            tokio::select! {
                () = deadline.as_mut() => {
                    return Err(HubError::Transport("liveness deadline expired".to_string()));
                }
                _ = ticker.tick() => {
                    send_message(&mut ws_tx, Message::Ping(Vec::new().into()), config.write_wait)
                        .await?;
                }
                envelope = outbound_rx.recv() => {
                    let Some(envelope) = envelope else {
                        return Ok(());
                    };
                    let json = serde_json::to_string(&envelope)
                        .map_err(|error| HubError::Malformed(error.to_string()))?;
                    send_message(&mut ws_tx, Message::text(json), config.write_wait).await?;
                }
                message = ws_rx.next() => {
                    deadline.as_mut().reset(Instant::now() + config.ping_wait);
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let envelope = serde_json::from_str::<Envelope>(text.as_str())
                                .map_err(|error| HubError::Malformed(error.to_string()))?;
                            if envelope.cmd == Command::Disconnect {
                                return Err(HubError::Disconnected);
                            }
                            handler(&sender, envelope);
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            send_message(&mut ws_tx, Message::Pong(payload), config.write_wait)
                                .await?;
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            return Err(HubError::Transport(error.to_string()));
                        }
                    }
                }
            }
        }
    }
}

async fn send_message<S>(
    ws_tx: &mut S,
    message: Message,
    write_wait: Duration,
) -> Result<(), HubError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    match time::timeout(write_wait, ws_tx.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(HubError::Transport(error.to_string())),
        Err(_) => Err(HubError::Transport("write timed out".to_string())),
    }
}

/// Cloneable handle that builds and enqueues outbound envelopes.
#[derive(Debug, Clone)]
pub struct ClientSender {
    outbound: mpsc::Sender<Envelope>,
}

impl ClientSender {
    /// Enqueues a raw envelope.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ConnectionClosed`] once the run loop has ended.
    pub async fn send(&self, envelope: Envelope) -> Result<(), HubError> {
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| HubError::ConnectionClosed)
    }

    /// Joins the broadcast channel `name`.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn subscribe(&self, name: &str) -> Result<(), HubError> {
        self.send(Envelope::named(Command::Subscribe, name, [])).await
    }

    /// Leaves the broadcast channel `name`.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn unsubscribe(&self, name: &str) -> Result<(), HubError> {
        self.send(Envelope::named(Command::Unsubscribe, name, []))
            .await
    }

    /// Broadcasts `payload` to every member of channel `name`.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn publish(&self, name: &str, payload: Vec<String>) -> Result<(), HubError> {
        self.send(Envelope::named(Command::Publish, name, payload))
            .await
    }

    /// Registers this connection as a provider of service `name`.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn provide(&self, name: &str) -> Result<(), HubError> {
        self.send(Envelope::named(Command::Provide, name, [])).await
    }

    /// Dispatches a job to one provider of service `name`, returning the
    /// correlation id the matching `Response` will carry.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn consume(&self, name: &str, payload: Vec<String>) -> Result<Uuid, HubError> {
        let id = Uuid::new_v4();
        let mut envelope = Envelope::named(Command::Consume, name, payload);
        envelope.id = Some(id);
        self.send(envelope).await?;
        Ok(id)
    }

    /// Dispatches fire-and-forget work to one provider of service `name`.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn produce(&self, name: &str, payload: Vec<String>) -> Result<(), HubError> {
        self.send(Envelope::named(Command::Produce, name, payload))
            .await
    }

    /// Sends an application payload directly to the peer `dest`.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn send_direct(&self, dest: PeerId, payload: Vec<String>) -> Result<(), HubError> {
        let mut envelope = Envelope::new(Command::Data);
        envelope.dest = Some(dest);
        envelope.data = payload;
        self.send(envelope).await
    }

    /// Replies to a `Consume` job, preserving its correlation id and
    /// `replyTo` so the hub can route the response to the requester.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn reply(&self, payload: Vec<String>, original: &Envelope) -> Result<(), HubError> {
        let mut envelope = Envelope::new(Command::Response);
        envelope.id = original.id;
        envelope.reply_to = original.reply_to;
        envelope.data = payload;
        self.send(envelope).await
    }

    /// Asks the hub to end this connection gracefully.
    ///
    /// # Errors
    ///
    /// See [`ClientSender::send`].
    pub async fn disconnect(&self) -> Result<(), HubError> {
        self.send(Envelope::new(Command::Disconnect)).await
    }
}
