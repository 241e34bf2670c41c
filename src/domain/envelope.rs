//! Wire envelope and command set.
//!
//! One [`Envelope`] is one JSON object on one WebSocket text frame. The
//! addressing fields are optional and omitted from the wire when absent;
//! `cmd` and `data` drive routing (see the hub dispatcher).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PeerId;

/// Routing command carried by every envelope.
///
/// A closed set: an unknown tag fails deserialization, which the hub
/// treats as a protocol error rather than a silently-ignored frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Application payload, meaningful only with `dest` addressing.
    Data,
    /// Hub-originated error report.
    Error,
    /// Join the channel named by `data[0]`.
    Subscribe,
    /// Leave the channel named by `data[0]`.
    Unsubscribe,
    /// Broadcast to every member of the channel named by `data[0]`.
    Publish,
    /// Register as a provider of the service named by `data[0]`.
    Provide,
    /// Dispatch to one provider of `data[0]`, expecting a correlated reply.
    Consume,
    /// Dispatch to one provider of `data[0]`, fire-and-forget.
    Produce,
    /// Route a provider's reply back to the peer named by `replyTo`.
    Response,
    /// End the connection.
    Disconnect,
}

impl Command {
    /// Whether `data[0]` must name a channel or service for this command.
    #[must_use]
    pub const fn requires_name(self) -> bool {
        matches!(
            self,
            Self::Subscribe
                | Self::Unsubscribe
                | Self::Publish
                | Self::Provide
                | Self::Consume
                | Self::Produce
        )
    }
}

/// The unit of routing.
///
/// `source` is always overwritten by the hub with the sending peer's id;
/// clients cannot forge it. `replyTo` is set by the hub when dispatching a
/// `Consume` job and cleared again when the matching `Response` is routed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation identifier; assigned by the hub on `Consume` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    /// Direct-target peer; when set, routing bypasses channels and services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<PeerId>,

    /// Sending peer, stamped by the hub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PeerId>,

    /// Peer a queue worker's `Response` is routed back to.
    #[serde(default, rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<PeerId>,

    /// Routing command.
    pub cmd: Command,

    /// Ordered payload; `data[0]` names the channel or service for the
    /// commands that require one, the rest is user payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
}

impl Envelope {
    /// Creates an envelope with the given command and no addressing or data.
    #[must_use]
    pub const fn new(cmd: Command) -> Self {
        Self {
            id: None,
            dest: None,
            source: None,
            reply_to: None,
            cmd,
            data: Vec::new(),
        }
    }

    /// Creates an envelope whose `data[0]` names a channel or service,
    /// followed by the user payload.
    #[must_use]
    pub fn named(cmd: Command, name: &str, payload: impl IntoIterator<Item = String>) -> Self {
        let mut data = vec![name.to_owned()];
        data.extend(payload);
        Self {
            data,
            ..Self::new(cmd)
        }
    }

    /// Creates a hub-originated [`Command::Error`] envelope.
    #[must_use]
    pub fn error(data: Vec<String>) -> Self {
        Self {
            data,
            ..Self::new(Command::Error)
        }
    }

    /// Returns the channel or service name this envelope addresses, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.data.first().map(String::as_str)
    }
}
