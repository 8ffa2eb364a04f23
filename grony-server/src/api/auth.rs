//! Request guard
//!
//! Runs before any handler. Checks are evaluated in order:
//! 1. Peer address must be loopback, whatever the credentials
//! 2. `Authorization` must be exactly `Bearer <secret>`

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::error::TransportError;
use crate::state::AppState;

pub async fn guard(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if !peer.ip().is_loopback() {
        return TransportError::Forbidden(peer).into_response();
    }

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if !bearer_matches(presented, &state.secret) {
        return TransportError::Unauthorized.into_response();
    }

    next.run(req).await
}

fn bearer_matches(presented: Option<&str>, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }

    presented
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret)
}
