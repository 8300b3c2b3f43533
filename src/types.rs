use crate::utils::mask;
use rquest::{
    header::{HeaderMap, HeaderValue},
    Client as RequestClient, Method, RequestBuilder,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub enum HttpRequest {
    Get {
        endpoint: String,
        params: Option<HashMap<String, String>>,
        additional_headers: Option<HeaderMap<HeaderValue>>,
    },
    Post {
        endpoint: String,
        form: Option<Vec<(String, String)>>,
        additional_headers: Option<HeaderMap<HeaderValue>>,
    },
    Put {
        endpoint: String,
        additional_headers: Option<HeaderMap<HeaderValue>>,
    },
}

impl HttpRequest {
    pub fn to_request_builder(&self, root: &str, client: &RequestClient) -> RequestBuilder {
        match self {
            HttpRequest::Get {
                endpoint,
                params,
                additional_headers,
            } => {
                let mut request = client.request(Method::GET, format!("{}{}", root, endpoint));
                if let Some(params) = params {
                    request = request.query(&params);
                }
                if let Some(headers) = additional_headers {
                    request = request.headers(headers.to_owned())
                }
                request
            }
            HttpRequest::Post {
                endpoint,
                form,
                additional_headers,
            } => {
                let mut request = client.request(Method::POST, format!("{}{}", root, endpoint));
                if let Some(form) = form {
                    request = request.form(form);
                }
                if let Some(headers) = additional_headers {
                    request = request.headers(headers.to_owned())
                }
                request
            }
            HttpRequest::Put {
                endpoint,
                additional_headers,
            } => {
                let mut request = client.request(Method::PUT, format!("{}{}", root, endpoint));
                if let Some(headers) = additional_headers {
                    request = request.headers(headers.to_owned())
                }
                request
            }
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            HttpRequest::Get { .. } => "GET",
            HttpRequest::Post { .. } => "POST",
            HttpRequest::Put { .. } => "PUT",
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            HttpRequest::Get { endpoint, .. }
            | HttpRequest::Post { endpoint, .. }
            | HttpRequest::Put { endpoint, .. } => endpoint,
        }
    }

    pub fn headers(&self) -> Option<&HeaderMap<HeaderValue>> {
        match self {
            HttpRequest::Get {
                additional_headers, ..
            }
            | HttpRequest::Post {
                additional_headers, ..
            }
            | HttpRequest::Put {
                additional_headers, ..
            } => additional_headers.as_ref(),
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    /// Skips the CSRF round trip when set.
    pub csrf_token: Option<String>,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            login: login.into(),
            password: password.into(),
            csrf_token: None,
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .field("csrf_token", &self.csrf_token.as_deref().map(mask))
            .finish()
    }
}

/// The `user` object returned by a successful login.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub trust_level: Option<u8>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    #[serde(default)]
    pub badge_count: Option<u64>,
    #[serde(default)]
    pub gamification_score: Option<i64>,
    #[serde(default)]
    pub time_read: Option<u64>,
}

/// Everything an authenticated request needs. Built once by
/// [`Forum::authenticate`](crate::forum::Forum::authenticate), read-only afterwards.
#[derive(Clone)]
pub struct CredentialBundle {
    auth_token: Option<String>,
    clearance: String,
    forum_session: Option<String>,
    csrf_token: String,
    cookie_header: String,
    profile: UserProfile,
}

impl CredentialBundle {
    pub(crate) fn new(
        auth_token: Option<String>,
        clearance: String,
        forum_session: Option<String>,
        csrf_token: String,
        profile: UserProfile,
    ) -> Self {
        let mut pairs = Vec::with_capacity(3);
        if let Some(token) = auth_token.as_deref() {
            pairs.push(("_t", token));
        }
        pairs.push(("cf_clearance", clearance.as_str()));
        if let Some(session) = forum_session.as_deref() {
            pairs.push(("_forum_session", session));
        }
        let cookie_header = crate::utils::cookie_header(&pairs);

        CredentialBundle {
            auth_token,
            clearance,
            forum_session,
            csrf_token,
            cookie_header,
            profile,
        }
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn clearance(&self) -> &str {
        &self.clearance
    }

    pub fn forum_session(&self) -> Option<&str> {
        self.forum_session.as_deref()
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// `_t=…; cf_clearance=…; _forum_session=…`, absent cookies omitted.
    pub fn cookie_header(&self) -> &str {
        &self.cookie_header
    }

    /// Names of the cookies in [`Self::cookie_header`], in header order.
    pub fn cookie_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.auth_token.is_some() {
            names.push("_t");
        }
        names.push("cf_clearance");
        if self.forum_session.is_some() {
            names.push("_forum_session");
        }
        names
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("auth_token", &self.auth_token.as_deref().map(mask))
            .field("clearance", &mask(&self.clearance))
            .field("forum_session", &self.forum_session.as_deref().map(mask))
            .field("csrf_token", &mask(&self.csrf_token))
            .field("profile", &self.profile)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Badge {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// HTTP status of the badge page.
    pub status: u16,
    pub badge_count: usize,
    pub basic_user_badge: Option<Badge>,
}

impl ValidationReport {
    pub fn has_basic_user_badge(&self) -> bool {
        self.basic_user_badge.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRecord {
    pub id: u64,
    pub title: String,
    pub like_count: u64,
    pub reply_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeResult {
    /// The reaction endpoint accepted the toggle (200 or 201).
    Liked { post_id: u64, status: u16 },
    Rejected {
        post_id: u64,
        status: u16,
        snippet: String,
    },
    /// The request never got a response.
    Failed { post_id: u64, error: String },
    /// The topic's first post could not be resolved; nothing was sent.
    Unresolved,
}

impl LikeResult {
    pub fn success(&self) -> bool {
        matches!(self, LikeResult::Liked { .. })
    }

    pub fn post_id(&self) -> Option<u64> {
        match self {
            LikeResult::Liked { post_id, .. }
            | LikeResult::Rejected { post_id, .. }
            | LikeResult::Failed { post_id, .. } => Some(*post_id),
            LikeResult::Unresolved => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            LikeResult::Liked { status, .. } | LikeResult::Rejected { status, .. } => {
                Some(*status)
            }
            LikeResult::Failed { .. } | LikeResult::Unresolved => None,
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            LikeResult::Liked { .. } => None,
            LikeResult::Rejected { status, snippet, .. } => {
                Some(format!("reaction rejected with status {}: {}", status, snippet))
            }
            LikeResult::Failed { error, .. } => Some(error.clone()),
            LikeResult::Unresolved => Some("post id unresolved".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeOutcome {
    pub topic_id: u64,
    pub title: String,
    pub result: LikeResult,
}

impl LikeOutcome {
    pub fn success(&self) -> bool {
        self.result.success()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_available: usize,
    pub browsed: usize,
    pub selected: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub outcomes: Vec<LikeOutcome>,
}

impl RunSummary {
    pub fn new(
        total_available: usize,
        browsed: usize,
        selected: usize,
        outcomes: Vec<LikeOutcome>,
    ) -> Self {
        let success_count = outcomes.iter().filter(|o| o.success()).count();
        RunSummary {
            total_available,
            browsed,
            selected,
            success_count,
            failure_count: selected.saturating_sub(success_count),
            outcomes,
        }
    }

    /// Percentage of selected topics that were liked.
    pub fn success_rate(&self) -> Option<f64> {
        (self.selected > 0).then(|| self.success_count as f64 / self.selected as f64 * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseReport {
    pub total_available: usize,
    pub browsed: Vec<TopicRecord>,
}
