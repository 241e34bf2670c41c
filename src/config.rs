//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::HubError;

/// Top-level hub configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Name reported in the stats snapshot.
    pub hub_name: String,

    /// Liveness deadline: a peer that produces no inbound frame (data or
    /// pong) for this long is disconnected.
    pub ping_wait: Duration,

    /// Timeout applied to each outbound WebSocket write.
    pub write_wait: Duration,

    /// Capacity of each peer's bounded outbound queue. A peer whose queue
    /// fills up is disconnected rather than allowed to stall routing.
    pub outbound_queue_capacity: usize,

    /// Capacity of the dispatcher's event queue.
    pub event_queue_capacity: usize,
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Config`] if `LISTEN_ADDR` is set but cannot be
    /// parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, HubError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| HubError::Config(format!("LISTEN_ADDR: {e}")))?;

        let hub_name =
            std::env::var("HUB_NAME").unwrap_or_else(|_| env!("CARGO_PKG_NAME").to_string());

        let ping_wait = Duration::from_secs(parse_env("PING_WAIT_SECS", 60));
        let write_wait = Duration::from_secs(parse_env("WRITE_WAIT_SECS", 10));
        let outbound_queue_capacity = parse_env("OUTBOUND_QUEUE_CAPACITY", 100);
        let event_queue_capacity = parse_env("EVENT_QUEUE_CAPACITY", 1024);

        Ok(Self {
            listen_addr,
            hub_name,
            ping_wait,
            write_wait,
            outbound_queue_capacity,
            event_queue_capacity,
        })
    }

    /// Interval between outbound liveness probes: nine tenths of
    /// [`HubConfig::ping_wait`], so a probe is always in flight before the
    /// remote end's deadline can expire.
    #[must_use]
    pub fn ping_period(&self) -> Duration {
        (self.ping_wait * 9) / 10
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            hub_name: env!("CARGO_PKG_NAME").to_string(),
            ping_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
            outbound_queue_capacity: 100,
            event_queue_capacity: 1024,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
