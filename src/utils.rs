use regex::Regex;
use rquest::header::{HeaderMap, HeaderValue, InvalidHeaderValue};

/// Browser the header profile pretends to be when no user agent is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36 Edg/137.0.0.0";

const SNIPPET_LEN: usize = 500;

/// Builds a `HeaderMap` from literal lowercase names. Values are checked, so the
/// expression evaluates to `Result<HeaderMap, InvalidHeaderValue>`.
#[macro_export]
macro_rules! easy_headers {
    ( { $($key:tt : $value:expr),* $(,)? } ) => {{
        (|| -> Result<rquest::header::HeaderMap, rquest::header::InvalidHeaderValue> {
            let mut headers = rquest::header::HeaderMap::new();
            $(
                headers.insert(
                    rquest::header::HeaderName::from_static($key),
                    rquest::header::HeaderValue::from_str(&$value.to_string())?,
                );
            )*
            Ok(headers)
        })()
    }};
}

#[macro_export]
macro_rules! easy_params {
    ( { $($key:tt : $value:expr),* $(,)? } ) => {{
        let mut params = std::collections::HashMap::new();
        $(
            params.insert($key.to_string(), $value.to_string());
        )*
        params
    }};
}

pub fn merge_headermaps(first: &mut HeaderMap, second: HeaderMap) {
    for (key, value) in second {
        if let Some(key) = key {
            first.insert(key, value);
        }
    }
}

fn platform(user_agent: &str) -> &'static str {
    if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS X") {
        "macOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "Unknown"
    }
}

/// Client hint brand list matching the browser named in the user agent.
pub fn sec_ch_ua(user_agent: &str) -> String {
    let version = |name: &str| -> Option<String> {
        let re = Regex::new(&format!(r"{}/(\d+)", regex::escape(name))).ok()?;
        re.captures(user_agent).map(|caps| caps[1].to_string())
    };

    if let Some(v) = version("Edg") {
        format!(
            "\"Microsoft Edge\";v=\"{v}\", \"Chromium\";v=\"{v}\", \"Not/A)Brand\";v=\"24\""
        )
    } else if let Some(v) = version("Chrome") {
        format!(
            "\"Google Chrome\";v=\"{v}\", \"Chromium\";v=\"{v}\", \"Not/A)Brand\";v=\"24\""
        )
    } else {
        let browser_regex = Regex::new(r"(?i)(firefox|safari)/([0-9]+)").ok();
        let (name, v) = browser_regex
            .and_then(|re| re.captures(user_agent))
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .unwrap_or(("Unknown".to_string(), "0".to_string()));
        format!("\"Not/A)Brand\";v=\"24\", \"{}\";v=\"{}\"", name, v)
    }
}

/// The header profile every request carries: user agent, client hints and the
/// XHR markers Discourse expects from its own front end.
pub fn default_headers(user_agent: Option<String>) -> Result<HeaderMap, InvalidHeaderValue> {
    let user_agent = user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
    let mut headers = HeaderMap::new();
    headers.insert("user-agent", HeaderValue::from_str(&user_agent)?);
    headers.insert(
        "accept",
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers.insert("accept-language", HeaderValue::from_static("zh,zh-CN;q=0.9"));
    headers.insert("sec-ch-ua", HeaderValue::from_str(&sec_ch_ua(&user_agent))?);
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert(
        "sec-ch-ua-platform",
        HeaderValue::from_str(&format!("\"{}\"", platform(&user_agent)))?,
    );
    headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
    headers.insert("discourse-present", HeaderValue::from_static("true"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-origin"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("priority", HeaderValue::from_static("u=1, i"));
    Ok(headers)
}

pub fn random_user_agent() -> String {
    randua::new().safari().desktop().to_string()
}

/// Name and value of a `Set-Cookie` header, attributes dropped.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

pub fn find_cookie<'a>(cookies: &'a [(String, String)], name: &str) -> Option<&'a str> {
    // Later cookies win, as they would in a browser jar.
    cookies
        .iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

pub fn cookie_header(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<String>>()
        .join("; ")
}

pub fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}

/// First few characters of a secret followed by an ellipsis.
pub fn mask(secret: &str) -> String {
    let shown: String = secret.chars().take(8).collect();
    if shown.len() < secret.len() {
        format!("{}...", shown)
    } else {
        "***".to_string()
    }
}
