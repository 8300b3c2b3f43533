use rquest::header::InvalidHeaderValue;
use thiserror::Error;

/// Network-level failure: the request never produced a response.
#[derive(Debug, Clone, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl From<rquest::Error> for TransportError {
    fn from(err: rquest::Error) -> Self {
        TransportError(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login or password not provided")]
    MissingCredentials,

    #[error("cf_clearance must be provided (copy it from the browser's challenge-platform response cookies)")]
    MissingClearance,

    #[error("failed to obtain CSRF token: {message}{}", describe(.status, .snippet))]
    Csrf {
        message: String,
        status: Option<u16>,
        snippet: Option<String>,
    },

    #[error("login rejected: {message}{}", describe(.status, .snippet))]
    Login {
        message: String,
        status: Option<u16>,
        snippet: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{endpoint} returned status {status}: {snippet}")]
    Status {
        endpoint: String,
        status: u16,
        snippet: String,
    },

    #[error("{endpoint} returned an undecodable body (status {status}): {source}\n  body: {snippet}")]
    Decode {
        endpoint: String,
        status: u16,
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("session value cannot be sent as a header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("delay range must be non-negative with min <= max (got {min}..{max})")]
    DelayRange { min: f64, max: f64 },

    #[error("invalid base url {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

fn describe(status: &Option<u16>, snippet: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(status) = status {
        out.push_str(&format!(" (status {})", status));
    }
    if let Some(snippet) = snippet.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("\n  response: {}", snippet));
    }
    out
}

#[test]
fn login_error_carries_status_and_snippet() {
    let err = AuthError::Login {
        message: "Invalid credentials".into(),
        status: Some(403),
        snippet: Some("{\"error\":\"Invalid credentials\"}".into()),
    };
    let text = err.to_string();
    assert!(text.starts_with("login rejected: Invalid credentials (status 403)"));
    assert!(text.contains("response: {\"error\""));
}

#[test]
fn csrf_error_without_status_is_plain() {
    let err = AuthError::Csrf {
        message: "timed out".into(),
        status: None,
        snippet: None,
    };
    assert_eq!(err.to_string(), "failed to obtain CSRF token: timed out");
}
