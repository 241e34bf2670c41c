//! Shared application state injected into all Axum handlers.

use std::fmt;

use crate::hub::Hub;
use crate::ws::handler::OriginPolicy;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the running hub dispatcher.
    pub hub: Hub,
    /// Optional origin policy applied before WebSocket upgrades.
    pub origin_policy: Option<OriginPolicy>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("hub", &self.hub)
            .field("origin_policy", &self.origin_policy.is_some())
            .finish()
    }
}
