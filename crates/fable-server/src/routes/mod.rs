//! Proxy routes.
//!
//! Each handler turns the inbound request into a [`ProxiedRequest`] and
//! relays whatever the forwarder returns: the backend's status and JSON
//! body on success, the uniform error contract otherwise.

pub mod auth;
pub mod health;
pub mod moderation;

pub use auth::{invitation_handler, login_handler, register_handler, verify_admin_handler};
pub use health::health_routes;
pub use moderation::chapters_handler;

use axum::{
    Json,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fable_client::{ProxiedRequest, ProxiedResponse};
use serde_json::Value;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Parse an inbound JSON body. An empty body is an empty object.
pub(crate) fn parse_body(bytes: &Bytes) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::debug!(error = %e, "Rejected malformed request body");
        ServerError::BadRequest("Invalid JSON body".to_string())
    })
}

/// Forward and relay.
pub(crate) async fn proxy(state: &AppState, request: ProxiedRequest) -> Result<Response> {
    let response = state.forwarder.forward(request).await?;
    Ok(relay(response))
}

fn relay(response: ProxiedResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    (status, Json(response.body)).into_response()
}
