//! Admin authentication routes.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Response,
};
use fable_client::ProxiedRequest;

use super::{parse_body, proxy};
use crate::caller::Caller;
use crate::error::Result;
use crate::state::AppState;

/// `POST /api/admin/auth/login`
pub async fn login_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> Result<Response> {
    let request =
        ProxiedRequest::post("/api/admin/auth/login", parse_body(&body)?).with_caller(caller);
    proxy(&state, request).await
}

/// `POST /api/admin/auth/register`
pub async fn register_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> Result<Response> {
    let request =
        ProxiedRequest::post("/api/admin/auth/register", parse_body(&body)?).with_caller(caller);
    proxy(&state, request).await
}

/// `GET /api/admin/auth/verify-admin`, bearer required.
pub async fn verify_admin_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Response> {
    let request = ProxiedRequest::get("/api/admin/auth/verify-admin")
        .with_caller(caller)
        .protected();
    proxy(&state, request).await
}

/// `GET /api/admin/auth/invitation/validate/{token}`
pub async fn invitation_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Caller(caller): Caller,
) -> Result<Response> {
    let path = format!(
        "/api/admin/auth/invitation/validate/{}",
        urlencoding::encode(&token)
    );
    proxy(&state, ProxiedRequest::get(path).with_caller(caller)).await
}
