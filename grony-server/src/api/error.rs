//! API Error Handling
//!
//! Requests rejected before dispatch. Every variant is answered with a bare
//! 500; the reason only goes to the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

/// Transport-level rejection
#[derive(Debug)]
pub enum TransportError {
    /// Peer is not on a loopback address
    Forbidden(SocketAddr),
    /// Missing or wrong bearer secret
    Unauthorized,
    /// Command outside the accepted set
    UnknownCommand(String),
    /// No route for the method and path
    NotRouted(String),
    /// Body could not be decoded
    MalformedBody(String),
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        match &self {
            TransportError::Forbidden(peer) => {
                tracing::warn!("Rejected request from non-loopback peer {}", peer)
            }
            TransportError::Unauthorized => tracing::warn!("Rejected request with bad credentials"),
            TransportError::UnknownCommand(command) => {
                tracing::warn!("Rejected unknown command '{}'", command)
            }
            TransportError::NotRouted(route) => tracing::warn!("No route for {}", route),
            TransportError::MalformedBody(reason) => {
                tracing::warn!("Rejected malformed body: {}", reason)
            }
        }

        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

pub type ApiResult<T> = Result<T, TransportError>;
