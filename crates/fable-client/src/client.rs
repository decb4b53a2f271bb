//! Typed backend client built on the [`Forwarder`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::{AuthApi, ProfileApi, ReadingApi};
use crate::error::{Error, Result};
use crate::forward::{CallerContext, DEFAULT_TIMEOUT, Forwarder, ProxiedRequest};

/// Backend API client.
///
/// # Example
///
/// ```no_run
/// use fable_client::BackendClient;
///
/// # async fn example() -> fable_client::Result<()> {
/// let client = BackendClient::builder()
///     .base_url("http://localhost:8080")
///     .build()?;
///
/// let reply = client.auth().login("reader@example.com", "hunter22").await?;
/// println!("token present: {}", reply.token.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct BackendClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    forwarder: Forwarder,
    caller: CallerContext,
}

impl BackendClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client around an existing forwarder.
    pub fn from_forwarder(forwarder: Forwarder) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                forwarder,
                caller: CallerContext::local(),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        self.inner.forwarder.base_url()
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.inner.forwarder
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the auth API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access the profile API.
    pub fn profile(&self) -> ProfileApi {
        ProfileApi::new(self.clone())
    }

    /// Access the reading API.
    pub fn reading(&self) -> ReadingApi {
        ReadingApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    fn caller(&self, token: Option<&str>) -> CallerContext {
        self.inner
            .caller
            .clone()
            .with_optional_bearer(token.map(str::to_string))
    }

    async fn send<T: DeserializeOwned>(&self, request: ProxiedRequest) -> Result<T> {
        self.inner.forwarder.forward(request).await?.json()
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<String>,
        token: Option<&str>,
    ) -> Result<T> {
        let mut request = ProxiedRequest::get(path)
            .with_query(query)
            .with_caller(self.caller(token));
        if token.is_some() {
            request = request.protected();
        }
        self.send(request).await
    }

    pub(crate) async fn post<T, B>(&self, path: &str, body: &B, token: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).map_err(|e| Error::Decode(e.to_string()))?;
        let mut request = ProxiedRequest::post(path, body).with_caller(self.caller(token));
        if token.is_some() {
            request = request.protected();
        }
        self.send(request).await
    }

    pub(crate) async fn put<T, B>(&self, path: &str, body: &B, token: &str) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).map_err(|e| Error::Decode(e.to_string()))?;
        let request = ProxiedRequest::put(path, body)
            .with_caller(self.caller(Some(token)))
            .protected();
        self.send(request).await
    }
}

/// Builder for creating a [`BackendClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the backend base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<BackendClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Only absolute http(s) URLs.
        let parsed = Url::parse(&base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported backend scheme: {}",
                parsed.scheme()
            )));
        }

        let mut caller = CallerContext::local();
        if let Some(agent) = self.user_agent {
            caller.user_agent = agent;
        }

        Ok(BackendClient {
            inner: Arc::new(ClientInner {
                forwarder: Forwarder::new(base_url).with_timeout(self.timeout),
                caller,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
