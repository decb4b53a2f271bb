//! Shared helpers for broker integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use fable_client::BackendClient;
use fable_session::{MemorySessionStore, SessionBroker};
use serde_json::{Value, json};
use wiremock::MockServer;

pub fn user_json(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "username": "reader_one",
        "role": "reader",
        "status": "active",
        "coinBalance": 40,
        "earningsBalance": 0,
        "emailVerified": true
    })
}

pub fn auth_json(token: &str) -> Value {
    json!({ "token": token, "user": user_json("u1", "a@b.com") })
}

/// A broker talking to the mock server, with an in-memory store.
pub fn broker(server: &MockServer) -> (SessionBroker, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let client = BackendClient::builder()
        .base_url(server.uri())
        .build()
        .expect("client");
    (SessionBroker::new(client, store.clone()), store)
}
