//! Parameter block of the `apicall` module

use std::collections::BTreeMap;
use std::fmt;

use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;

use crate::condition::MatchRule;
use crate::module::ModuleParams;

/// URL scheme of the probed endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl TryFrom<String> for Protocol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err("'protocol' must be one of 'http' or 'https'".to_string()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        })
    }
}

/// Basic authentication credentials
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Auth {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Retry budgets, one per failure category
///
/// `total` bounds every attempt; a category without its own budget is only
/// bounded by `total`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryCounts {
    #[serde(default = "default_total")]
    pub total: u32,
    #[serde(default)]
    pub connect: Option<u32>,
    #[serde(default)]
    pub read: Option<u32>,
    #[serde(default)]
    pub redirect: Option<u32>,
    #[serde(default)]
    pub status: Option<u32>,
    #[serde(default)]
    pub other: Option<u32>,
}

impl Default for RetryCounts {
    fn default() -> Self {
        Self {
            total: default_total(),
            connect: None,
            read: None,
            redirect: None,
            status: None,
            other: None,
        }
    }
}

/// A previous attempt, seeded from the manifest or recorded on each retry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestHistory {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub redirect_location: Option<String>,
}

/// Polling (retry) configuration; its presence enables retries and redirects
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollParams {
    #[serde(default)]
    pub counts: RetryCounts,
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default)]
    pub status_forcelist: Option<Vec<u16>>,
    #[serde(default)]
    pub backoff_factor: f64,
    #[serde(default = "enabled")]
    pub raise_on_redirect: bool,
    #[serde(default = "enabled")]
    pub raise_on_status: bool,
    #[serde(default)]
    pub history: Option<Vec<RequestHistory>>,
    #[serde(default = "enabled")]
    pub respect_retry_after_header: bool,
    #[serde(default = "default_remove_headers_on_redirect")]
    pub remove_headers_on_redirect: Vec<String>,
}

impl Default for PollParams {
    fn default() -> Self {
        Self {
            counts: RetryCounts::default(),
            allowed_methods: default_allowed_methods(),
            status_forcelist: None,
            backoff_factor: 0.0,
            raise_on_redirect: true,
            raise_on_status: true,
            history: None,
            respect_retry_after_header: true,
            remove_headers_on_redirect: default_remove_headers_on_redirect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiCallParams {
    #[serde(default)]
    pub protocol: Protocol,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Expected response status code
    #[serde(default = "default_response")]
    pub response: u16,
    #[serde(default)]
    pub contains: Option<MatchRule>,
    #[serde(default)]
    pub not_contains: Option<MatchRule>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub auth: Option<Auth>,
    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub poll: Option<PollParams>,
}

impl ApiCallParams {
    /// `protocol://host:port/path`, with exactly one slash before the path
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.protocol,
            self.host,
            self.port,
            self.path.trim_start_matches('/')
        )
    }
}

impl ModuleParams for ApiCallParams {
    const MODULE: &'static str = "apicall";

    fn check(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("'host' must not be empty".to_string());
        }
        Method::from_bytes(self.method.as_bytes())
            .map_err(|_| format!("'method' is not a valid HTTP method: `{}`", self.method))?;

        for (name, value) in self.headers.iter().flatten() {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name `{name}`"))?;
            HeaderValue::from_str(value)
                .map_err(|_| format!("invalid value for header `{name}`"))?;
        }

        if let Some(poll) = &self.poll
            && !(poll.backoff_factor.is_finite() && poll.backoff_factor >= 0.0)
        {
            return Err("'backoff_factor' must be a non-negative number".to_string());
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    80
}

fn default_path() -> String {
    "/".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_response() -> u16 {
    200
}

fn default_timeout() -> u64 {
    10
}

fn default_total() -> u32 {
    10
}

fn enabled() -> bool {
    true
}

fn default_allowed_methods() -> Vec<String> {
    ["DELETE", "GET", "HEAD", "OPTIONS", "PUT", "TRACE"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_remove_headers_on_redirect() -> Vec<String> {
    ["Cookie", "Authorization", "Proxy-Authorization"]
        .into_iter()
        .map(String::from)
        .collect()
}
