//! Caller context extraction.
//!
//! The backend audits who is acting, so each inbound request is reduced to
//! a [`CallerContext`]: the client address, the user agent and, when
//! present, a bearer token.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{
        HeaderMap,
        header::{AUTHORIZATION, USER_AGENT},
        request::Parts,
    },
};
use fable_client::CallerContext;
use fable_client::forward::UNKNOWN;

/// Headers consulted for the client address, in priority order.
pub const CLIENT_IP_HEADERS: [&str; 4] = [
    "x-forwarded-for",
    "x-real-ip",
    "cf-connecting-ip",
    "x-client-ip",
];

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the client address from proxy headers, then the TCP peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in CLIENT_IP_HEADERS {
        if let Some(value) = header_str(headers, name) {
            // x-forwarded-for is a list; the first hop is the client.
            let first = value.split(',').next().map(str::trim).unwrap_or_default();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn user_agent(headers: &HeaderMap) -> String {
    header_str(headers, USER_AGENT.as_str())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// Extract a bearer token. Only `Bearer <non-empty>` counts.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Build the full caller context for a request.
pub fn caller_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> CallerContext {
    CallerContext::new(client_ip(headers, peer), user_agent(headers))
        .with_optional_bearer(bearer_token(headers))
}

/// Extractor wrapping [`CallerContext`].
///
/// Works with or without `ConnectInfo`; routers served without it fall
/// back to the proxy headers alone.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerContext);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Caller(caller_context(&parts.headers, peer)))
    }
}
