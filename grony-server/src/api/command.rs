//! Command API Handler
//!
//! `POST /grony/{command}`: decodes the body into parameters and runs the
//! command on the blocking pool.

use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Path, Request, State, rejection::PathRejection},
    http::{Method, Uri, header::CONTENT_TYPE},
    response::IntoResponse,
};
use std::sync::Arc;

use grony_core::dto::command::CommandResponse;

use crate::api::error::{ApiResult, TransportError};
use crate::service::{Command, Params};
use crate::state::AppState;

/// POST /grony/{command}
/// Run one registry command
pub async fn run_command(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
    req: Request,
) -> ApiResult<Json<CommandResponse>> {
    let Path(name) = name.map_err(|e| TransportError::NotRouted(e.body_text()))?;
    let Ok(command) = name.parse::<Command>() else {
        return Err(TransportError::UnknownCommand(name));
    };

    let params = decode_params(req).await?;
    tracing::debug!("Dispatching {} with {} parameters", command, params.len());

    let dispatcher = Arc::clone(&state.dispatcher);
    let response =
        match tokio::task::spawn_blocking(move || dispatcher.dispatch(command, &params)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Command {} did not complete: {}", command, e);
                CommandResponse::fatal(format!("Command '{}' failed unexpectedly", command))
            }
        };

    Ok(Json(response))
}

/// Anything that is not a POST to a command path
pub async fn not_routed(method: Method, uri: Uri) -> impl IntoResponse {
    TransportError::NotRouted(format!("{} {}", method, uri))
}

// =============================================================================
// Body Decoding
// =============================================================================

/// Decodes a form or multipart body. Other content types carry no parameters.
async fn decode_params(req: Request) -> ApiResult<Params> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, &())
            .await
            .map_err(|e| TransportError::MalformedBody(e.body_text()))?;
        return Ok(first_values(pairs));
    }

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| TransportError::MalformedBody(e.body_text()))?;

        let mut pairs = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| TransportError::MalformedBody(e.body_text()))?
        {
            let Some(key) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| TransportError::MalformedBody(e.body_text()))?;
            pairs.push((key, value));
        }
        return Ok(first_values(pairs));
    }

    Ok(Params::new())
}

/// Collapses repeated keys, keeping the first value
fn first_values(pairs: Vec<(String, String)>) -> Params {
    let mut params = Params::new();
    for (key, value) in pairs {
        params.entry(key).or_insert(value);
    }
    params
}
