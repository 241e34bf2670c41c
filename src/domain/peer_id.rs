//! Type-safe peer identifier.
//!
//! [`PeerId`] is a newtype wrapper around [`uuid::Uuid`] (v4) providing
//! type safety so that peer identifiers cannot be confused with envelope
//! correlation ids or other UUIDs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one live connection.
///
/// Wraps a UUID v4. Assigned once when the connection handshake completes
/// and immutable thereafter; never reused within a hub's lifetime. Used as
/// the peer-registry key, the `dest`/`source`/`replyTo` addressing fields,
/// and channel/service membership entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(uuid::Uuid);

impl PeerId {
    /// Creates a new random `PeerId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `PeerId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for PeerId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PeerId> for uuid::Uuid {
    fn from(id: PeerId) -> Self {
        id.0
    }
}
