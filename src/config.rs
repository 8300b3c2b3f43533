use crate::client::DEFAULT_TIMEOUT;
use crate::error::ConfigError;
use crate::forum::{DEFAULT_BASIC_BADGE, DEFAULT_TIMEZONE};
use crate::orchestrator::{DelayRange, LikePlan};
use crate::types::Credentials;
use clap::{ArgAction, Parser};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://linux.do";

#[derive(Parser, Clone)]
#[command(
    name = "discoursehttp",
    version,
    about = "Log in to a Discourse forum, browse the latest topics and like a few of them"
)]
pub struct Args {
    /// Login e-mail or username
    #[arg(long, env = "LINUX_DO_EMAIL", hide_env_values = true, default_value = "")]
    pub login: String,

    #[arg(long, env = "LINUX_DO_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// Cloudflare clearance cookie copied from a browser session
    #[arg(long, env = "CF_CLEARANCE", hide_env_values = true, default_value = "")]
    pub cf_clearance: String,

    /// Use this CSRF token instead of fetching one
    #[arg(long, env = "LINUX_DO_CSRF_TOKEN", hide_env_values = true)]
    pub csrf_token: Option<String>,

    /// Like topics (false only browses)
    #[arg(
        long,
        env = "ENABLE_LIKE",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = parse_switch
    )]
    pub enable_like: bool,

    /// How many topics to like
    #[arg(long, env = "LIKE_COUNT", default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub like_count: u32,

    /// How many feed topics to browse: a positive number or "all"
    #[arg(long, env = "BROWSE_COUNT", default_value = "all", value_parser = parse_browse_count)]
    pub browse_count: BrowseCount,

    /// Lower bound of the pause between likes, in seconds
    #[arg(long, env = "DELAY_MIN", default_value_t = 2.0)]
    pub delay_min: f64,

    /// Upper bound of the pause between likes, in seconds
    #[arg(long, env = "DELAY_MAX", default_value_t = 5.0)]
    pub delay_max: f64,

    #[arg(long, env = "FORUM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Timezone reported at login
    #[arg(long, env = "FORUM_TIMEZONE", default_value = DEFAULT_TIMEZONE)]
    pub timezone: String,

    /// Check the session against the badge page after logging in
    #[arg(long, env = "CHECK_SESSION", default_value = "false", action = ArgAction::Set, value_parser = parse_switch)]
    pub check_session: bool,

    /// Badge whose presence marks a basic (trust level 1) user
    #[arg(long, env = "BASIC_BADGE_NAME", default_value = DEFAULT_BASIC_BADGE)]
    pub badge_name: String,

    /// Send a random desktop user agent instead of the default one
    #[arg(long, env = "RANDOM_USER_AGENT", default_value = "false", action = ArgAction::Set, value_parser = parse_switch)]
    pub random_user_agent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseCount {
    All,
    Limit(usize),
}

impl BrowseCount {
    pub fn limit(self) -> Option<usize> {
        match self {
            BrowseCount::All => None,
            BrowseCount::Limit(n) => Some(n),
        }
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(format!("expected true/false, got {:?}", other)),
    }
}

fn parse_browse_count(value: &str) -> Result<BrowseCount, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("all") || value.is_empty() {
        return Ok(BrowseCount::All);
    }
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(BrowseCount::Limit(n)),
        _ => Err(format!("expected a positive number or \"all\", got {:?}", value)),
    }
}

/// Validated run configuration. Not `Debug`: it holds the clearance token.
#[derive(Clone)]
pub struct Settings {
    pub credentials: Credentials,
    pub clearance: String,
    pub base_url: Url,
    pub timeout: Duration,
    pub timezone: String,
    pub basic_badge: String,
    pub user_agent: Option<String>,
    pub check_session: bool,
    pub enable_like: bool,
    pub plan: LikePlan,
}

impl Args {
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let base_url = Url::parse(&self.base_url).map_err(|source| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        let delay = DelayRange::from_secs(self.delay_min, self.delay_max)?;

        let mut credentials = Credentials::new(self.login, self.password);
        if let Some(token) = self.csrf_token {
            credentials = credentials.with_csrf_token(token);
        }

        Ok(Settings {
            credentials,
            clearance: self.cf_clearance,
            base_url,
            timeout: Duration::from_secs(self.timeout),
            timezone: self.timezone,
            basic_badge: self.badge_name,
            user_agent: self.random_user_agent.then(crate::utils::random_user_agent),
            check_session: self.check_session,
            enable_like: self.enable_like,
            plan: LikePlan {
                max_likes: self.like_count as usize,
                browse_limit: self.browse_count.limit(),
                delay,
            },
        })
    }
}

impl Settings {
    /// Site root without a trailing slash, as requests expect it.
    pub fn origin(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}
