//! Domain layer: peer identity and the wire envelope.
//!
//! Pure data types shared by the hub dispatcher, the WebSocket boundary,
//! and the outbound connector role. No behavior beyond construction and
//! field access lives here.

pub mod envelope;
pub mod peer_id;

pub use envelope::{Command, Envelope};
pub use peer_id::PeerId;
