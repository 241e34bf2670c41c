//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type for the crate. Variants reachable
//! from the HTTP bootstrap surface map to a status code and a structured
//! JSON error body; the rest surface through library APIs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All HTTP error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "origin not allowed"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges below).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Central error enum for the hub and connector roles.
///
/// # Error Code Ranges
///
/// | Range     | Category            | HTTP Status                |
/// |-----------|---------------------|----------------------------|
/// | 1000–1999 | Protocol/Validation | 400 Bad Request            |
/// | 2000–2999 | Connection          | 403 Forbidden / 410 Gone   |
/// | 3000–3999 | Server/Transport    | 500 / 503                  |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration could not be loaded or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An envelope could not be decoded or violated the protocol.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The origin policy rejected the upgrade request.
    #[error("origin not allowed")]
    OriginRejected,

    /// The hub ended the connection with a Disconnect command.
    #[error("disconnected by hub")]
    Disconnected,

    /// The connector's run loop has ended; no more envelopes can be sent.
    #[error("connection closed")]
    ConnectionClosed,

    /// Underlying transport failure (dial, read, or write).
    #[error("transport error: {0}")]
    Transport(String),

    /// The dispatcher has shut down and no longer accepts requests.
    #[error("hub is shutting down")]
    Shutdown,
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(_) => 1001,
            Self::Malformed(_) => 1002,
            Self::OriginRejected => 2001,
            Self::Disconnected => 2002,
            Self::ConnectionClosed => 2003,
            Self::Transport(_) => 3001,
            Self::Shutdown => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::OriginRejected => StatusCode::FORBIDDEN,
            Self::Disconnected | Self::ConnectionClosed => StatusCode::GONE,
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_by_category() {
        assert_eq!(
            HubError::Malformed("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(HubError::OriginRejected.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(HubError::Shutdown.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(HubError::OriginRejected.error_code(), 2001);
        assert_eq!(HubError::Shutdown.error_code(), 3002);
    }
}
