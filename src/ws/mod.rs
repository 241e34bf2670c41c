//! WebSocket layer: upgrade handling and the per-peer connection lifecycle.
//!
//! The `/ws` endpoint upgrades to a hub peer connection. Each connection
//! runs a read loop with a liveness deadline, a keepalive ticker, and a
//! writer draining the peer's bounded outbound queue.

pub mod connection;
pub mod handler;
