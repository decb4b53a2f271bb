//! Backend forwarding and response classification.
//!
//! Every call to the backend, whether it originates from the inbound proxy
//! routes or from the session broker, passes through [`Forwarder::forward`].
//! The forwarder attaches caller context, applies a deadline, and classifies
//! the backend's answer into either a [`ProxiedResponse`] or an [`Error`].

use std::time::Duration;

use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DEFAULT_REJECTION_MESSAGE, Error, MISSING_AUTH_MESSAGE, Result};

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Placeholder for caller fields that could not be determined.
pub const UNKNOWN: &str = "unknown";

/// Body field carrying the caller's address.
pub const IP_ADDRESS_FIELD: &str = "ipAddress";

/// Body field carrying the caller's user agent.
pub const USER_AGENT_FIELD: &str = "userAgent";

/// Who the request is being made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub bearer: Option<String>,
    pub client_ip: String,
    pub user_agent: String,
}

impl CallerContext {
    pub fn new(client_ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            bearer: None,
            client_ip: client_ip.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Context for calls made by this process on its own behalf.
    pub fn local() -> Self {
        Self::new(
            "127.0.0.1",
            format!("fable/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Attach a bearer token. Empty tokens are treated as absent.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Attach an optional bearer token.
    pub fn with_optional_bearer(self, token: Option<String>) -> Self {
        match token {
            Some(token) => self.with_bearer(token),
            None => Self {
                bearer: None,
                ..self
            },
        }
    }
}

impl Default for CallerContext {
    fn default() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }
}

/// A request to be forwarded to the backend.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    /// Path relative to the backend base URL, starting with `/`.
    pub path: String,
    /// Raw query string, forwarded verbatim.
    pub query: Option<String>,
    pub caller: CallerContext,
    pub body: Option<Value>,
    /// Whether the request must carry a bearer token.
    pub requires_auth: bool,
}

impl ProxiedRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            caller: CallerContext::default(),
            body: None,
            requires_auth: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the raw query string. Empty strings are dropped.
    pub fn with_query(mut self, query: Option<impl Into<String>>) -> Self {
        self.query = query.map(Into::into).filter(|q: &String| !q.is_empty());
        self
    }

    pub fn with_caller(mut self, caller: CallerContext) -> Self {
        self.caller = caller;
        self
    }

    /// Mark the request as requiring a bearer token.
    pub fn protected(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Whether the method carries a body that gets caller provenance.
    fn enriches_body(&self) -> bool {
        self.method == Method::POST || self.method == Method::PUT || self.method == Method::PATCH
    }

    /// The body as it will be sent: JSON objects on POST/PUT/PATCH get the
    /// caller's address and user agent added.
    pub fn outbound_body(&self) -> Option<Value> {
        let mut body = self.body.clone()?;
        if self.enriches_body()
            && let Value::Object(map) = &mut body
        {
            map.insert(
                IP_ADDRESS_FIELD.to_string(),
                Value::String(self.caller.client_ip.clone()),
            );
            map.insert(
                USER_AGENT_FIELD.to_string(),
                Value::String(self.caller.user_agent.clone()),
            );
        }
        Some(body)
    }
}

/// A successfully classified backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxiedResponse {
    pub status: u16,
    pub body: Value,
}

impl ProxiedResponse {
    /// Decode the body into a typed value.
    pub fn json<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.body).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Whether a content type declares a JSON body.
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Pick the user-facing message out of a backend error body.
pub fn rejection_message(body: &Value) -> String {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .filter(|msg| !msg.is_empty())
        .unwrap_or(DEFAULT_REJECTION_MESSAGE)
        .to_string()
}

/// Classify a raw backend response.
///
/// Non-JSON content types are treated as the backend being unavailable no
/// matter what status came with them: an HTML error page with a 200 is still
/// a broken backend.
pub fn classify(status: u16, content_type: Option<&str>, body: &[u8]) -> Result<ProxiedResponse> {
    if !is_json_content_type(content_type) {
        return Err(Error::BackendUnavailable {
            status,
            content_type: content_type.map(str::to_string),
        });
    }

    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))?
    };

    if !(200..300).contains(&status) {
        return Err(Error::Rejected {
            status,
            message: rejection_message(&body),
        });
    }

    Ok(ProxiedResponse { status, body })
}

/// Forwards requests to the backend.
#[derive(Debug, Clone)]
pub struct Forwarder {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder for an already-normalized base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full backend URL for a request.
    pub fn url_for(&self, request: &ProxiedRequest) -> String {
        let path = if request.path.starts_with('/') {
            request.path.clone()
        } else {
            format!("/{}", request.path)
        };
        match &request.query {
            Some(query) => format!("{}{}?{}", self.base_url, path, query),
            None => format!("{}{}", self.base_url, path),
        }
    }

    /// Forward a request and classify the answer.
    pub async fn forward(&self, request: ProxiedRequest) -> Result<ProxiedResponse> {
        if request.requires_auth && request.caller.bearer.is_none() {
            tracing::debug!(path = %request.path, "Rejecting protected request without bearer");
            return Err(Error::Unauthorized(MISSING_AUTH_MESSAGE.to_string()));
        }

        let url = self.url_for(&request);
        let user_agent = HeaderValue::from_str(&request.caller.user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(UNKNOWN));

        let mut req = self
            .http
            .request(request.method.clone(), &url)
            .timeout(self.timeout)
            .header(header::USER_AGENT, user_agent)
            .header("X-Forwarded-For", request.caller.client_ip.as_str());

        if let Some(token) = &request.caller.bearer {
            req = req.bearer_auth(token);
        }
        if let Some(body) = request.outbound_body() {
            req = req.json(&body);
        }

        tracing::debug!(method = %request.method, url = %url, "Forwarding request to backend");

        let response = req.send().await.map_err(|e| {
            tracing::error!(
                method = %request.method,
                path = %request.path,
                timed_out = e.is_timeout(),
                error = %e,
                "Backend request failed"
            );
            Error::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| {
            tracing::error!(path = %request.path, error = %e, "Failed to read backend response");
            Error::Transport(e.to_string())
        })?;

        let result = classify(status, content_type.as_deref(), &bytes);
        match &result {
            Ok(_) => tracing::debug!(path = %request.path, status, "Backend call succeeded"),
            Err(Error::BackendUnavailable { content_type, .. }) => tracing::warn!(
                path = %request.path,
                status,
                content_type = ?content_type,
                "Backend returned non-JSON response"
            ),
            Err(e) => tracing::debug!(path = %request.path, status, error = %e, "Backend rejected request"),
        }
        result
    }
}
