//! Moderation routes.

use axum::{
    extract::{RawQuery, State},
    response::Response,
};
use fable_client::ProxiedRequest;

use super::proxy;
use crate::caller::Caller;
use crate::error::Result;
use crate::state::AppState;

/// `GET /api/admin/moderation/chapters`, bearer required.
///
/// The query string is passed through untouched so filters and paging the
/// backend understands need no mirroring here.
pub async fn chapters_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let request = ProxiedRequest::get("/api/admin/moderation/chapters")
        .with_query(query)
        .with_caller(caller)
        .protected();
    proxy(&state, request).await
}
