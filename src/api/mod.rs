//! HTTP bootstrap surface: system routes and the WebSocket upgrade.

pub mod system;

use axum::routing::get;
use axum::Router;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete router: system endpoints plus the `/ws` upgrade.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(system::routes())
        .route("/ws", get(ws_handler))
}
