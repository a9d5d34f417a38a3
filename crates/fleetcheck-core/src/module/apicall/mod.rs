//! `apicall`: probe an HTTP endpoint and check its response

mod params;
mod retry;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION, RETRY_AFTER};
use reqwest::{Client, Method, Response, Url, redirect};
use tracing::{debug, instrument, warn};

pub use params::{ApiCallParams, Auth, PollParams, Protocol, RequestHistory, RetryCounts};
use retry::{Attempt, ErrorKind, REDIRECT_STATUSES, RetryPolicy};

use super::{ModuleKind, ModuleParams, ValidatorModule};
use crate::condition::apply_rules;
use crate::error::ModuleError;
use crate::result::{ModuleResult, Verdict};

/// HTTP probe with its own client, default headers and retry policy
#[derive(Debug)]
pub struct ApiCall {
    params: ApiCallParams,
    client: Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    retry: Option<RetryPolicy>,
}

impl ApiCall {
    /// Build the client for `params`
    ///
    /// # Errors
    /// Returns `ModuleError::Schema` if the method, URL or headers are invalid
    /// and `ModuleError::Http` if the client cannot be constructed.
    pub fn new(params: ApiCallParams) -> Result<Self, ModuleError> {
        let schema_error = |message: String| ModuleError::Schema {
            module: ApiCallParams::MODULE,
            message,
        };

        let method = Method::from_bytes(params.method.to_uppercase().as_bytes())
            .map_err(|e| schema_error(format!("invalid method `{}`: {e}", params.method)))?;
        let url = Url::parse(&params.url())
            .map_err(|e| schema_error(format!("invalid url `{}`: {e}", params.url())))?;

        let mut headers = HeaderMap::new();
        for (name, value) in params.headers.iter().flatten() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| schema_error(format!("invalid header name `{name}`: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| schema_error(format!("invalid value for header `{name}`: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(params.timeout))
            .build()
            .map_err(|e| ModuleError::Http {
                method: method.to_string(),
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let retry = params.poll.as_ref().map(RetryPolicy::from);

        Ok(Self {
            params,
            client,
            method,
            url,
            headers,
            retry,
        })
    }

    async fn send(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        auth: Option<&Auth>,
    ) -> Result<Response, reqwest::Error> {
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if let Some(auth) = auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }
        request.send().await
    }

    /// Issue the request, following redirects and retrying as the poll
    /// policy allows, and return the response to evaluate
    async fn request(&self) -> Result<Response, ModuleError> {
        let mut method = self.method.clone();
        let mut url = self.url.clone();
        let mut headers = self.headers.clone();
        let mut auth = self.params.auth.clone();
        let mut policy = self.retry.clone();

        let fatal = |method: &Method, url: &Url, message: String| ModuleError::Http {
            method: method.to_string(),
            url: url.to_string(),
            message,
        };

        loop {
            let response = match self.send(&method, &url, &headers, auth.as_ref()).await {
                Ok(response) => response,
                Err(err) => {
                    let Some(policy) = policy.as_mut() else {
                        return Err(fatal(&method, &url, err.to_string()));
                    };
                    let attempt = Attempt::Error {
                        kind: ErrorKind::of(&err),
                        message: err.to_string(),
                    };
                    policy
                        .increment(method.as_str(), url.as_str(), attempt)
                        .map_err(|cause| fatal(&method, &url, cause))?;

                    let delay = policy.backoff();
                    warn!(url = %url, error = %err, ?delay, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let Some(policy) = policy.as_mut() else {
                return Ok(response);
            };
            let status = response.status().as_u16();

            if let Some(location) = redirect_location(&response) {
                let next = url
                    .join(&location)
                    .map_err(|e| fatal(&method, &url, format!("invalid redirect `{location}`: {e}")))?;

                let attempt = Attempt::Redirect {
                    status,
                    location: &location,
                };
                if let Err(cause) = policy.increment(method.as_str(), url.as_str(), attempt) {
                    if policy.raise_on_redirect {
                        return Err(fatal(&method, &url, cause));
                    }
                    return Ok(response);
                }

                // HEAD carries no body, so a 303 leaves it unchanged
                if status == 303 && method != Method::HEAD {
                    method = Method::GET;
                }
                if next.origin() != url.origin() {
                    let stripped: Vec<HeaderName> = headers
                        .keys()
                        .filter(|name| policy.strips_on_redirect(name.as_str()))
                        .cloned()
                        .collect();
                    for name in stripped {
                        headers.remove(name);
                    }
                    if policy.strips_on_redirect("authorization") {
                        auth = None;
                    }
                }

                debug!(from = %url, to = %next, status, "following redirect");
                url = next;
                continue;
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            if policy.is_retry(method.as_str(), status, retry_after.is_some()) {
                let attempt = Attempt::Status { status };
                if let Err(cause) = policy.increment(method.as_str(), url.as_str(), attempt) {
                    if policy.raise_on_status {
                        return Err(fatal(&method, &url, cause));
                    }
                    return Ok(response);
                }

                let delay = policy.delay_for(retry_after.as_deref());
                debug!(url = %url, status, ?delay, "retrying on response status");
                tokio::time::sleep(delay).await;
                continue;
            }

            return Ok(response);
        }
    }
}

fn redirect_location(response: &Response) -> Option<String> {
    if !REDIRECT_STATUSES.contains(&response.status().as_u16()) {
        return None;
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Text the response body is matched against.
///
/// A JSON body is matched against its compact serialization, a JSON string
/// against its contents. Anything else is matched as raw text.
fn match_content(body: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(value) => value.to_string(),
        Err(_) => body,
    }
}

#[async_trait]
impl ValidatorModule for ApiCall {
    fn kind(&self) -> ModuleKind {
        ModuleKind::ApiCall
    }

    #[instrument(skip(self), fields(method = %self.method, url = %self.url))]
    async fn run(&self) -> Result<ModuleResult, ModuleError> {
        let response = self.request().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let body = response.text().await.map_err(|e| ModuleError::Http {
            method: self.method.to_string(),
            url: final_url,
            message: format!("failed to read response body: {e}"),
        })?;
        let content = match_content(body);

        let mut verdict = Verdict::pass();
        if status != self.params.response {
            verdict.fail(content.clone());
        }
        apply_rules(
            &mut verdict,
            &content,
            self.params.contains.as_ref(),
            self.params.not_contains.as_ref(),
            "response body",
        );

        Ok(verdict.finish(Some(status.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(yaml: &str) -> ApiCallParams {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        ApiCallParams::validate_schema(&value).unwrap()
    }

    #[test]
    fn test_new_builds_url_and_headers() {
        let call = ApiCall::new(params(
            "{host: mgmt, port: 8080, path: /v1/o, method: post, headers: {Accept: application/json}}",
        ))
        .unwrap();

        assert_eq!(call.url.as_str(), "http://mgmt:8080/v1/o");
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.headers["accept"], "application/json");
        assert!(call.retry.is_none());
        assert_eq!(call.kind(), ModuleKind::ApiCall);
    }

    #[test]
    fn test_new_enables_retry_with_poll() {
        let call = ApiCall::new(params("{host: mgmt, poll: {counts: {total: 2}}}")).unwrap();
        assert!(call.retry.is_some());
    }

    #[test]
    fn test_new_rejects_unparseable_url() {
        let mut p = params("host: mgmt");
        p.host = "bad host".into();
        let err = ApiCall::new(p).unwrap_err();
        assert!(matches!(err, ModuleError::Schema { module: "apicall", .. }));
    }

    #[test]
    fn test_match_content() {
        assert_eq!(match_content("{\"a\": 1}".into()), "{\"a\":1}");
        assert_eq!(match_content("\"ready\"".into()), "ready");
        assert_eq!(match_content("<html>up</html>".into()), "<html>up</html>");
    }
}
