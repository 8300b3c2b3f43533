//! Calls against the forum's private API. Each method is one request (two for
//! [`Forum::authenticate`]) and turns the response into a typed result.

use crate::client::{RawResponse, Transport};
use crate::easy_headers;
use crate::easy_params;
use crate::error::{AuthError, RequestError};
use crate::types::{
    Badge, CredentialBundle, Credentials, HttpRequest, LikeResult, TopicRecord, UserProfile,
    ValidationReport,
};
use crate::utils::{find_cookie, mask};
use rquest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
/// Localized name of the trust-level-1 badge on linux.do.
pub const DEFAULT_BASIC_BADGE: &str = "基本用户";
pub const UNTITLED: &str = "(untitled)";

const AUTH_COOKIE: &str = "_t";
const CLEARANCE_COOKIE: &str = "cf_clearance";
const SESSION_COOKIE: &str = "_forum_session";

#[derive(Debug, Clone)]
pub struct Forum<T: Transport> {
    transport: T,
    origin: String,
    timezone: String,
    basic_badge: String,
}

#[derive(Deserialize)]
struct CsrfResponse {
    csrf: Option<String>,
}

/// Human-readable form of a login body's `error` field: a string as is, a
/// list joined with commas, anything else as compact JSON.
fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(message) => message.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

#[derive(Deserialize)]
struct BadgesResponse {
    #[serde(default)]
    badges: Vec<Badge>,
}

#[derive(Deserialize, Default)]
struct LatestResponse {
    #[serde(default)]
    topic_list: TopicList,
}

#[derive(Deserialize, Default)]
struct TopicList {
    #[serde(default)]
    topics: Vec<RawTopic>,
}

#[derive(Deserialize)]
struct RawTopic {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    fancy_title: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    like_count: Option<u64>,
    #[serde(default)]
    posts_count: Option<u64>,
}

impl RawTopic {
    fn into_record(self) -> Option<TopicRecord> {
        let id = self.id?;
        Some(TopicRecord {
            id,
            title: self
                .fancy_title
                .or(self.title)
                .unwrap_or_else(|| UNTITLED.to_string()),
            like_count: self.like_count.unwrap_or(0),
            reply_count: self.posts_count.unwrap_or(1).saturating_sub(1),
        })
    }
}

#[derive(Deserialize)]
struct TopicDetail {
    #[serde(default)]
    post_stream: PostStream,
}

#[derive(Deserialize, Default)]
struct PostStream {
    #[serde(default)]
    posts: Vec<PostRef>,
}

#[derive(Deserialize)]
struct PostRef {
    id: Option<u64>,
}

impl<T: Transport> Forum<T> {
    /// `origin` is the site root used for `origin`/`referer` headers, e.g.
    /// `https://linux.do`.
    pub fn new(transport: T, origin: impl Into<String>) -> Self {
        Forum {
            transport,
            origin: origin.into().trim_end_matches('/').to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            basic_badge: DEFAULT_BASIC_BADGE.to_string(),
        }
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn basic_badge(mut self, name: impl Into<String>) -> Self {
        self.basic_badge = name.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    /// Headers for requests made on behalf of a logged-in session.
    fn session_headers(
        &self,
        bundle: &CredentialBundle,
        referer: &str,
    ) -> Result<HeaderMap, RequestError> {
        Ok(easy_headers!({
            "x-csrf-token": bundle.csrf_token(),
            "discourse-logged-in": "true",
            "referer": self.url(referer),
            "cookie": bundle.cookie_header(),
        })?)
    }

    /// Fetches a fresh CSRF token. Returns it together with any cookies the
    /// response set, which the login request has to echo back.
    pub async fn fetch_csrf_token(
        &self,
        clearance: &str,
    ) -> Result<(String, Vec<(String, String)>), AuthError> {
        let csrf_error = |message: String, status: Option<u16>, snippet: Option<String>| {
            AuthError::Csrf {
                message,
                status,
                snippet,
            }
        };

        let headers = easy_headers!({
            "x-csrf-token": "undefined",
            "referer": self.url("/login"),
            "cookie": format!("{}={}", CLEARANCE_COOKIE, clearance),
        })
        .map_err(|e| csrf_error(e.to_string(), None, None))?;

        let response = self
            .transport
            .send(HttpRequest::Get {
                endpoint: "/session/csrf".to_string(),
                params: None,
                additional_headers: Some(headers),
            })
            .await
            .map_err(|e| csrf_error(e.to_string(), None, None))?;

        if !response.is_success() {
            return Err(csrf_error(
                "unexpected status".to_string(),
                Some(response.status),
                Some(response.snippet()),
            ));
        }

        let parsed: CsrfResponse = response.json().map_err(|e| {
            csrf_error(
                format!("response is not valid JSON: {}", e),
                Some(response.status),
                Some(response.snippet()),
            )
        })?;

        match parsed.csrf.filter(|t| !t.is_empty()) {
            Some(token) => {
                info!(token = %mask(&token), "CSRF token acquired");
                Ok((token, response.cookies))
            }
            None => Err(csrf_error(
                "no csrf field in response".to_string(),
                Some(response.status),
                Some(response.snippet()),
            )),
        }
    }

    /// Logs in and assembles the credential bundle used by every later call.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        clearance: &str,
    ) -> Result<CredentialBundle, AuthError> {
        if clearance.is_empty() {
            return Err(AuthError::MissingClearance);
        }
        if credentials.login.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let (csrf_token, mut cookies) = match credentials.csrf_token.clone() {
            Some(token) => {
                debug!("using preset CSRF token");
                (token, Vec::new())
            }
            None => self.fetch_csrf_token(clearance).await?,
        };

        let login_error = |message: String, status: Option<u16>, snippet: Option<String>| {
            AuthError::Login {
                message,
                status,
                snippet,
            }
        };

        let mut cookie = format!("{}={}", CLEARANCE_COOKIE, clearance);
        for (name, value) in cookies.iter().filter(|(n, _)| n != CLEARANCE_COOKIE) {
            cookie.push_str(&format!("; {}={}", name, value));
        }

        let headers = easy_headers!({
            "x-csrf-token": csrf_token,
            "content-type": "application/x-www-form-urlencoded; charset=UTF-8",
            "origin": self.origin,
            "referer": self.url("/login"),
            "cookie": cookie,
        })
        .map_err(|e| login_error(e.to_string(), None, None))?;

        let form = vec![
            ("login".to_string(), credentials.login.clone()),
            ("password".to_string(), credentials.password.clone()),
            ("second_factor_method".to_string(), "1".to_string()),
            ("timezone".to_string(), self.timezone.clone()),
        ];

        info!(login = %credentials.login, "logging in");
        let response = self
            .transport
            .send(HttpRequest::Post {
                endpoint: "/session".to_string(),
                form: Some(form),
                additional_headers: Some(headers),
            })
            .await
            .map_err(|e| login_error(e.to_string(), None, None))?;

        let body: Value = response.json().map_err(|_| {
            login_error(
                "response is not valid JSON".to_string(),
                Some(response.status),
                Some(response.snippet()),
            )
        })?;

        let server_error = body.get("error").and_then(error_message);
        let user = match body.get("user") {
            None | Some(Value::Null) => None,
            Some(user) => Some(UserProfile::deserialize(user)),
        };

        let profile = match (response.status, user) {
            (200, Some(Ok(user))) => user,
            (_, user) => {
                let message = match (server_error, user) {
                    (Some(message), _) => message,
                    (None, Some(Err(e))) => format!("unexpected login response: {}", e),
                    (None, _) => "login failed".to_string(),
                };
                warn!(status = response.status, %message, "login rejected");
                return Err(login_error(
                    message,
                    Some(response.status),
                    Some(response.snippet()),
                ));
            }
        };

        cookies.extend(response.cookies);
        let auth_token = find_cookie(&cookies, AUTH_COOKIE).map(str::to_string);
        let forum_session = find_cookie(&cookies, SESSION_COOKIE).map(str::to_string);
        if auth_token.is_none() {
            warn!("login succeeded but no {} cookie was set", AUTH_COOKIE);
        }

        info!(
            username = %profile.username,
            id = profile.id,
            trust_level = ?profile.trust_level,
            "logged in"
        );
        Ok(CredentialBundle::new(
            auth_token,
            clearance.to_string(),
            forum_session,
            csrf_token,
            profile,
        ))
    }

    /// GET that fails on any non-2xx status.
    async fn get(
        &self,
        endpoint: &str,
        params: Option<std::collections::HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Result<RawResponse, RequestError> {
        let response: RawResponse = self
            .transport
            .send(HttpRequest::Get {
                endpoint: endpoint.to_string(),
                params,
                additional_headers: Some(headers),
            })
            .await?;

        if !response.is_success() {
            return Err(RequestError::Status {
                endpoint: endpoint.to_string(),
                status: response.status,
                snippet: response.snippet(),
            });
        }
        Ok(response)
    }

    fn decode<D: DeserializeOwned>(endpoint: &str, response: &RawResponse) -> Result<D, RequestError> {
        response.json().map_err(|source| RequestError::Decode {
            endpoint: endpoint.to_string(),
            status: response.status,
            source,
            snippet: response.snippet(),
        })
    }

    async fn get_json<D: DeserializeOwned>(
        &self,
        endpoint: String,
        params: Option<std::collections::HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Result<D, RequestError> {
        let response = self.get(&endpoint, params, headers).await?;
        Self::decode(&endpoint, &response)
    }

    /// Checks the session against the user's badge page.
    pub async fn validate(
        &self,
        bundle: &CredentialBundle,
        username: &str,
    ) -> Result<ValidationReport, RequestError> {
        let headers = self.session_headers(bundle, &format!("/u/{}/badges", username))?;
        let endpoint = format!("/user-badges/{}.json", username);
        let response = self
            .get(&endpoint, Some(easy_params!({ "grouped": "true" })), headers)
            .await?;
        let parsed: BadgesResponse = Self::decode(&endpoint, &response)?;

        let badge_count = parsed.badges.len();
        let basic_user_badge = parsed
            .badges
            .into_iter()
            .find(|badge| badge.name == self.basic_badge);
        info!(
            status = response.status,
            badge_count,
            basic_user = basic_user_badge.is_some(),
            "session validated"
        );
        Ok(ValidationReport {
            status: response.status,
            badge_count,
            basic_user_badge,
        })
    }

    /// One page of the latest-topics feed.
    pub async fn list_topics(
        &self,
        bundle: &CredentialBundle,
        page: u32,
    ) -> Result<Vec<TopicRecord>, RequestError> {
        let headers = self.session_headers(bundle, "/")?;
        let parsed: LatestResponse = self
            .get_json(
                "/latest.json".to_string(),
                Some(easy_params!({ "no_definitions": "true", "page": page })),
                headers,
            )
            .await?;

        let raw_count = parsed.topic_list.topics.len();
        let topics = parsed
            .topic_list
            .topics
            .into_iter()
            .filter_map(RawTopic::into_record)
            .collect::<Vec<TopicRecord>>();
        if topics.len() < raw_count {
            warn!(skipped = raw_count - topics.len(), "feed entries without an id skipped");
        }
        info!(page, count = topics.len(), "topics fetched");
        Ok(topics)
    }

    /// Id of the topic's first post, or `None` when it cannot be determined.
    pub async fn resolve_first_post(&self, bundle: &CredentialBundle, topic_id: u64) -> Option<u64> {
        let headers = match self.session_headers(bundle, &format!("/t/{}", topic_id)) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(topic_id, error = %e, "could not build request");
                return None;
            }
        };
        let detail: TopicDetail = match self
            .get_json(format!("/t/{}", topic_id), None, headers)
            .await
        {
            Ok(detail) => detail,
            Err(e) => {
                warn!(topic_id, error = %e, "failed to fetch topic detail");
                return None;
            }
        };

        let post_id = detail.post_stream.posts.first().and_then(|post| post.id);
        if post_id.is_none() {
            debug!(topic_id, "topic has no posts in its stream");
        }
        post_id
    }

    /// Toggles the heart reaction on a post. Never fails; problems are folded
    /// into the returned [`LikeResult`].
    pub async fn toggle_like(
        &self,
        bundle: &CredentialBundle,
        post_id: u64,
        topic_id: u64,
    ) -> LikeResult {
        let headers = self
            .session_headers(bundle, &format!("/t/topic/{}", topic_id))
            .and_then(|mut headers| {
                let extra = easy_headers!({
                    "origin": self.origin,
                    "content-length": "0",
                })?;
                crate::utils::merge_headermaps(&mut headers, extra);
                Ok(headers)
            });
        let headers = match headers {
            Ok(headers) => headers,
            Err(e) => {
                return LikeResult::Failed {
                    post_id,
                    error: e.to_string(),
                }
            }
        };

        let response = self
            .transport
            .send(HttpRequest::Put {
                endpoint: format!(
                    "/discourse-reactions/posts/{}/custom-reactions/heart/toggle.json",
                    post_id
                ),
                additional_headers: Some(headers),
            })
            .await;

        match response {
            Ok(response) if matches!(response.status, 200 | 201) => {
                info!(topic_id, post_id, status = response.status, "liked");
                LikeResult::Liked {
                    post_id,
                    status: response.status,
                }
            }
            Ok(response) => {
                warn!(topic_id, post_id, status = response.status, "like rejected");
                LikeResult::Rejected {
                    post_id,
                    status: response.status,
                    snippet: response.snippet(),
                }
            }
            Err(e) => {
                warn!(topic_id, post_id, error = %e, "like request failed");
                LikeResult::Failed {
                    post_id,
                    error: e.to_string(),
                }
            }
        }
    }
}
