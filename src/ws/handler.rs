//! Axum WebSocket upgrade handler and origin policy.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use super::connection::serve_peer;
use crate::app_state::AppState;
use crate::error::HubError;

/// Predicate over the upgrade request headers.
///
/// Returning `false` rejects the connection with `403 Forbidden` before a
/// peer is created. When no policy is registered, every origin is accepted.
pub type OriginPolicy = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync + 'static>;

/// `GET /ws` — upgrade the HTTP connection to a hub peer.
///
/// The peer address is taken from the `X-Real-IP` header when a proxy sets
/// it, falling back to the socket address.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if let Some(policy) = &state.origin_policy
        && !policy(&headers)
    {
        tracing::warn!(remote = %remote, "upgrade rejected by origin policy");
        return HubError::OriginRejected.into_response();
    }

    let addr = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| remote.to_string(), str::to_owned);

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| serve_peer(socket, hub, addr))
        .into_response()
}
