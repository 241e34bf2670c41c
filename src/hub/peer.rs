//! Peer metadata and the per-connection outbound path.

use std::collections::HashSet;
use std::fmt;

use axum::body::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{Envelope, PeerId};

/// Reason a peer is being disconnected by the hub.
///
/// Carried into the best-effort `Error` envelope delivered before the
/// transport closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Envelope failed to decode or violated a payload invariant.
    Malformed,
    /// Command not routable in this position (e.g. `Data` without `dest`).
    InvalidCommand,
    /// Outbound queue overflowed or a write timed out.
    Unresponsive,
}

impl DisconnectReason {
    /// Wire text placed in the `Error` envelope payload.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed message",
            Self::InvalidCommand => "invalid command code",
            Self::Unresponsive => "unresponsive peer",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item on a peer's bounded outbound queue.
///
/// Keepalive control frames share the writer path with envelopes so that a
/// single task owns the sink.
#[derive(Debug, Clone)]
pub(crate) enum Frame {
    /// JSON envelope to encode onto a text frame.
    Envelope(Envelope),
    /// Liveness probe.
    Ping,
    /// Reply to a remote liveness probe, echoing its payload.
    Pong(Bytes),
    /// Close the transport and stop the writer.
    Close,
}

/// Dispatcher-owned metadata for one live connection.
///
/// The dispatcher holds the authoritative copy; stats snapshots clone it.
#[derive(Debug, Clone, Serialize)]
pub struct Peer {
    /// Stable identifier, unique for the hub's lifetime.
    pub id: PeerId,
    /// Remote address, for diagnostics only.
    pub addr: String,
    /// Number of envelopes delivered to this peer.
    pub msg_count: u64,
    /// Channels this peer is subscribed to.
    #[serde(skip_serializing_if = "HashSet::is_empty")]
    pub channels: HashSet<String>,
    /// Services this peer provides.
    #[serde(skip_serializing_if = "HashSet::is_empty")]
    pub services: HashSet<String>,
}

impl Peer {
    /// Creates metadata for a freshly-connected peer.
    #[must_use]
    pub fn new(id: PeerId, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
            msg_count: 0,
            channels: HashSet::new(),
            services: HashSet::new(),
        }
    }
}

/// Registry entry coupling peer metadata to its outbound queue and the
/// cancellation token that unwinds its connection tasks.
#[derive(Debug)]
pub(crate) struct PeerHandle {
    pub(crate) peer: Peer,
    pub(crate) outbound: mpsc::Sender<Frame>,
    pub(crate) cancel: CancellationToken,
}
