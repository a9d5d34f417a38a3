//! Retry accounting for the `apicall` module
//!
//! Every retried attempt spends one unit of `total` and one unit of the
//! budget of its category (connect, read, other, redirect or status). The
//! policy is exhausted as soon as any budget drops below zero.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::params::{PollParams, RequestHistory};

/// Upper bound of the exponential backoff
const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Status codes for which a `Retry-After` header triggers a retry
const RETRY_AFTER_STATUS_CODES: [u16; 3] = [413, 429, 503];

/// Statuses treated as redirects when they carry a `Location` header
pub(crate) const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Failure category of a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Connect,
    Read,
    Other,
}

impl ErrorKind {
    pub(crate) fn of(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            ErrorKind::Connect
        } else if err.is_timeout() || err.is_body() || err.is_decode() {
            ErrorKind::Read
        } else {
            ErrorKind::Other
        }
    }
}

/// Why an attempt is being retried
#[derive(Debug)]
pub(crate) enum Attempt<'a> {
    Error { kind: ErrorKind, message: String },
    Redirect { status: u16, location: &'a str },
    Status { status: u16 },
}

#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    total: i64,
    connect: Option<i64>,
    read: Option<i64>,
    redirect: Option<i64>,
    status: Option<i64>,
    other: Option<i64>,
    allowed_methods: Vec<String>,
    status_forcelist: Vec<u16>,
    backoff_factor: f64,
    pub(crate) raise_on_redirect: bool,
    pub(crate) raise_on_status: bool,
    pub(crate) respect_retry_after_header: bool,
    remove_headers_on_redirect: Vec<String>,
    history: Vec<RequestHistory>,
}

impl From<&PollParams> for RetryPolicy {
    fn from(poll: &PollParams) -> Self {
        let budget = |count: Option<u32>| count.map(i64::from);
        Self {
            total: i64::from(poll.counts.total),
            connect: budget(poll.counts.connect),
            read: budget(poll.counts.read),
            redirect: budget(poll.counts.redirect),
            status: budget(poll.counts.status),
            other: budget(poll.counts.other),
            allowed_methods: poll
                .allowed_methods
                .iter()
                .map(|m| m.to_uppercase())
                .collect(),
            status_forcelist: poll.status_forcelist.clone().unwrap_or_default(),
            backoff_factor: poll.backoff_factor,
            raise_on_redirect: poll.raise_on_redirect,
            raise_on_status: poll.raise_on_status,
            respect_retry_after_header: poll.respect_retry_after_header,
            remove_headers_on_redirect: poll
                .remove_headers_on_redirect
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
            history: poll.history.clone().unwrap_or_default(),
        }
    }
}

impl RetryPolicy {
    fn is_method_retryable(&self, method: &str) -> bool {
        self.allowed_methods.contains(&method.to_uppercase())
    }

    /// Whether a response with `status` should be retried
    pub(crate) fn is_retry(&self, method: &str, status: u16, has_retry_after: bool) -> bool {
        if !self.is_method_retryable(method) {
            return false;
        }
        if self.status_forcelist.contains(&status) {
            return true;
        }
        self.total > 0
            && self.respect_retry_after_header
            && has_retry_after
            && RETRY_AFTER_STATUS_CODES.contains(&status)
    }

    /// Whether `header` is dropped when a redirect leaves the origin
    pub(crate) fn strips_on_redirect(&self, header: &str) -> bool {
        self.remove_headers_on_redirect
            .iter()
            .any(|h| h.eq_ignore_ascii_case(header))
    }

    /// Spend the budgets for one retried attempt.
    ///
    /// # Errors
    /// Returns the cause when the policy is exhausted, or when a read error
    /// hits a method that must not be retried.
    pub(crate) fn increment(
        &mut self,
        method: &str,
        url: &str,
        attempt: Attempt<'_>,
    ) -> Result<(), String> {
        self.total -= 1;

        let mut entry = RequestHistory {
            method: Some(method.to_string()),
            url: Some(url.to_string()),
            ..RequestHistory::default()
        };

        let cause = match attempt {
            Attempt::Error {
                kind: ErrorKind::Connect,
                message,
            } => {
                spend(&mut self.connect);
                entry.error = Some(message.clone());
                message
            }
            Attempt::Error {
                kind: ErrorKind::Read,
                message,
            } => {
                if !self.is_method_retryable(method) {
                    return Err(message);
                }
                spend(&mut self.read);
                entry.error = Some(message.clone());
                message
            }
            Attempt::Error {
                kind: ErrorKind::Other,
                message,
            } => {
                spend(&mut self.other);
                entry.error = Some(message.clone());
                message
            }
            Attempt::Redirect { status, location } => {
                spend(&mut self.redirect);
                entry.status = Some(status);
                entry.redirect_location = Some(location.to_string());
                "too many redirects".to_string()
            }
            Attempt::Status { status } => {
                spend(&mut self.status);
                entry.status = Some(status);
                format!("too many {status} error responses")
            }
        };

        self.history.push(entry);

        if self.is_exhausted() {
            Err(format!("max retries exceeded ({cause})"))
        } else {
            Ok(())
        }
    }

    fn is_exhausted(&self) -> bool {
        [self.connect, self.read, self.redirect, self.status, self.other]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.total))
            .any(|count| count < 0)
    }

    /// Delay before the next attempt, from the run of consecutive errors
    ///
    /// Zero after the first error, then `backoff_factor * 2^(n-1)`, capped.
    pub(crate) fn backoff(&self) -> Duration {
        let consecutive = self
            .history
            .iter()
            .rev()
            .take_while(|h| h.redirect_location.is_none())
            .count();
        if consecutive <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(consecutive - 1).unwrap_or(i32::MAX);
        let seconds = self.backoff_factor * 2f64.powi(exponent);
        if seconds.is_finite() {
            Duration::from_secs_f64(seconds).min(BACKOFF_MAX)
        } else {
            BACKOFF_MAX
        }
    }

    /// Delay before retrying a response, honouring `Retry-After` if allowed
    pub(crate) fn delay_for(&self, retry_after: Option<&str>) -> Duration {
        retry_after
            .filter(|_| self.respect_retry_after_header)
            .and_then(parse_retry_after)
            .unwrap_or_else(|| self.backoff())
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[RequestHistory] {
        &self.history
    }
}

fn spend(budget: &mut Option<i64>) {
    if let Some(count) = budget {
        *count -= 1;
    }
}

/// Parse a `Retry-After` value: delay seconds or an HTTP date
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
