//! Application state shared across handlers.

use std::sync::Arc;

use fable_client::Forwarder;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single path to the backend.
    pub forwarder: Arc<Forwarder>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(forwarder: Forwarder, config: ServerConfig) -> Self {
        Self {
            forwarder: Arc::new(forwarder),
            config: Arc::new(config),
        }
    }
}
