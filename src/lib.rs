//! # relay-hub
//!
//! WebSocket message hub routing envelopes between persistent peers.
//!
//! Each connected peer holds one long-lived WebSocket; the hub routes every
//! inbound [`domain::Envelope`] by direct addressing (`dest`), broadcast
//! channels (`Subscribe`/`Publish`), or load-balanced service queues
//! (`Provide`/`Consume`/`Produce`). All registry state lives in a single
//! dispatcher task; peers never observe partially-updated subscriptions.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket peers, HTTP bootstrap)
//!     │
//!     ├── WS upgrade + per-peer lifecycle (ws/)
//!     ├── System endpoints (api/)
//!     │
//!     ├── Hub handle + stats snapshot (hub/)
//!     ├── Dispatcher task: peers / channels / services (hub/)
//!     │
//!     └── Envelope + command data model (domain/)
//! ```
//!
//! The same envelope protocol is spoken by the outbound connector role in
//! [`client`], which replaces the hub-side registries with a single local
//! handler callback.

pub mod api;
pub mod app_state;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod ws;
