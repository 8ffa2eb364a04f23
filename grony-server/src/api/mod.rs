//! API Module
//!
//! HTTP layer of the control server. Every route sits behind the
//! [`auth::guard`] middleware; anything unrouted is answered with a 500.

pub mod auth;
pub mod command;
pub mod error;

use axum::{Router, middleware, routing::post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the control router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/grony/{command}", post(command::run_command))
        .route("/grony/{command}/", post(command::run_command))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::guard))
        .fallback(command::not_routed)
        .method_not_allowed_fallback(command::not_routed)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
