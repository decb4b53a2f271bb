//! Server configuration.

use std::net::SocketAddr;

use fable_config::{DEFAULT_BIND_ADDRESS, FableConfig};

use crate::error::Result;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Enable request logging.
    pub request_logging: bool,

    /// CORS allowed origins (empty = no CORS).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            request_logging: true,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the server settings from the `[server]` section.
    pub fn from_fable(config: &FableConfig) -> Result<Self> {
        let section = config.server.clone().unwrap_or_default();
        Ok(Self {
            bind_address: config.bind_address()?,
            request_logging: section.request_logging.unwrap_or(true),
            cors_origins: section.cors_origins,
        })
    }

    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }
}
