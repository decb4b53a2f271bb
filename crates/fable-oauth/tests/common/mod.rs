//! Shared fixtures for LINE and Google flow tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use fable_client::{BackendClient, MemoryNotifier};
use fable_config::LineConfig;
use fable_oauth::{LineExchanger, LineLogin, StateGuard};
use fable_session::{MemorySessionStore, SessionBroker};
use serde_json::{Value, json};
use wiremock::MockServer;

pub struct Harness {
    /// Stands in for both the LINE token endpoint and the backend.
    pub server: MockServer,
    pub broker: Arc<SessionBroker>,
    pub notifier: Arc<MemoryNotifier>,
    pub store: Arc<MemorySessionStore>,
}

impl Harness {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemorySessionStore::new());
        let client = BackendClient::builder()
            .base_url(server.uri())
            .build()
            .expect("client");
        Self {
            broker: Arc::new(SessionBroker::new(client, store.clone())),
            notifier: Arc::new(MemoryNotifier::new()),
            store,
            server,
        }
    }

    pub fn line_config(&self) -> LineConfig {
        LineConfig {
            channel_id: "1650000000".into(),
            channel_secret: "channel-secret".into(),
            redirect_uri: "https://fable.example/auth/line/callback".into(),
            authorize_url: "https://access.line.me/oauth2/v2.1/authorize".into(),
            token_url: format!("{}/oauth2/v2.1/token", self.server.uri()),
        }
    }

    pub fn line_login(&self, guard: StateGuard) -> LineLogin {
        LineLogin::new(
            guard,
            LineExchanger::new(self.line_config()),
            self.broker.clone(),
            self.notifier.clone(),
        )
        .with_failure_delay(Duration::from_secs(3))
    }
}

pub fn backend_login_reply(token: &str) -> Value {
    json!({
        "token": token,
        "user": {"id": "line-user", "email": "reader@line.example", "role": "reader"}
    })
}
