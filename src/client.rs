use crate::error::TransportError;
use crate::types::HttpRequest;
use crate::utils::{default_headers, parse_set_cookie, snippet};
use rquest::tls::Impersonate;
use rquest::Client as RequestClient;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What the forum layer needs from a response: status, the cookies it set and
/// the body text.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub cookies: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn snippet(&self) -> String {
        snippet(&self.body)
    }
}

pub trait Transport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>>;
}

#[derive(Debug, Clone)]
pub struct SpoofedClient {
    root: String,
    client: RequestClient,
}

impl SpoofedClient {
    pub fn new(
        root: impl Into<String>,
        user_agent: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let headers = default_headers(user_agent).map_err(|e| TransportError(e.to_string()))?;

        // Cookies travel in an explicit header built from the session, so the
        // client keeps no jar of its own.
        let client = RequestClient::builder()
            .impersonate_without_headers(Impersonate::Chrome128)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(SpoofedClient {
            root: root.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }
}

impl Transport for SpoofedClient {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        debug!(method = request.method(), endpoint = request.endpoint(), "sending request");
        let builder = request.to_request_builder(&self.root, &self.client);
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let cookies = response
            .headers()
            .get_all("set-cookie")
            .into_iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect::<Vec<(String, String)>>();
        let body = response.text().await?;

        debug!(status, cookies = cookies.len(), bytes = body.len(), "response received");
        Ok(RawResponse {
            status,
            cookies,
            body,
        })
    }
}
