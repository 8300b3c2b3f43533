//! Scripted transport and fixtures shared by the unit tests.

use crate::client::{RawResponse, Transport};
use crate::error::TransportError;
use crate::types::{CredentialBundle, HttpRequest, UserProfile};
use std::collections::HashMap;
use std::sync::Mutex;

/// Replays canned responses keyed by method and endpoint and records every
/// request it sees. Unrouted requests fail like a refused connection.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: HashMap<(String, String), RawResponse>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, method: &str, endpoint: &str, response: RawResponse) -> Self {
        self.routes
            .insert((method.to_string(), endpoint.to_string()), response);
        self
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_with(&self, method: &str) -> Vec<HttpRequest> {
        self.calls()
            .into_iter()
            .filter(|call| call.method() == method)
            .collect()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let key = (request.method().to_string(), request.endpoint().to_string());
        self.calls.lock().unwrap().push(request);
        self.routes
            .get(&key)
            .cloned()
            .ok_or_else(|| TransportError(format!("connection refused: {} {}", key.0, key.1)))
    }
}

pub fn json(status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        cookies: Vec::new(),
        body: body.to_string(),
    }
}

pub fn bundle() -> CredentialBundle {
    let profile: UserProfile =
        serde_json::from_str(r#"{"id": 42, "username": "alice", "trust_level": 1}"#).unwrap();
    CredentialBundle::new(
        Some("authtoken".into()),
        "clearance".into(),
        Some("session".into()),
        "csrf-token".into(),
        profile,
    )
}
