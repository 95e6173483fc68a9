//! reqwest implementation of [`Forwarder`] against the Publer REST API.

use publer_types::{ForwardError, Forwarder, Headers, QueryParams};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

const MIN_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 10;

/// Forwards tool requests to the Publer API.
///
/// Callers supply complete headers (credentials included); the client only adds the base URL,
/// the socket timeout, and retries for transport failures. HTTP error statuses are never retried
/// here: they are mapped to [`ForwardError`] and returned.
pub struct PublerClient {
    client: reqwest::Client,
    base_url: String,
    max_attempts: u32,
}

impl PublerClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration, max_attempts: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        headers: &Headers,
        params: Option<&QueryParams>,
        body: Option<&Value>,
    ) -> Result<Value, ForwardError> {
        let url = self.url(endpoint);
        let mut attempt = 1;
        loop {
            match self.send_once(&method, &url, headers, params, body).await {
                Err(ForwardError::Network(msg)) if attempt < self.max_attempts => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        endpoint,
                        attempt,
                        error = %msg,
                        delay_secs = delay.as_secs(),
                        "transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        headers: &Headers,
        params: Option<&QueryParams>,
        body: Option<&Value>,
    ) -> Result<Value, ForwardError> {
        let mut req = self.client.request(method.clone(), url);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(params) = params {
            let pairs: Vec<(&str, String)> = params
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.as_str(), query_value(v)))
                .collect();
            req = req.query(&pairs);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req
            .send()
            .await
            .map_err(|e| ForwardError::Network(e.to_string()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ForwardError::Network(e.to_string()))?;
        tracing::debug!(%url, status = status.as_u16(), "upstream response");
        parse_response(status, &text)
    }
}

#[async_trait::async_trait]
impl Forwarder for PublerClient {
    async fn get(
        &self,
        endpoint: &str,
        headers: &Headers,
        params: Option<&QueryParams>,
    ) -> Result<Value, ForwardError> {
        self.request(Method::GET, endpoint, headers, params, None)
            .await
    }

    async fn post(
        &self,
        endpoint: &str,
        headers: &Headers,
        body: Option<&Value>,
    ) -> Result<Value, ForwardError> {
        self.request(Method::POST, endpoint, headers, None, body)
            .await
    }
}

fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

fn query_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 2s, 4s, 8s, ... capped at 10s.
fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64
        .saturating_pow(attempt)
        .clamp(MIN_BACKOFF_SECS, MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

fn parse_response(status: StatusCode, text: &str) -> Result<Value, ForwardError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ForwardError::Authentication(
            "Invalid API key or insufficient permissions".to_string(),
        ));
    }
    if status == StatusCode::FORBIDDEN {
        return Err(ForwardError::Authentication(
            "Access forbidden - check workspace permissions".to_string(),
        ));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ForwardError::RateLimited(
            "API rate limit exceeded".to_string(),
        ));
    }
    if status.is_client_error() || status.is_server_error() {
        let message = serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| text.to_string());
        return Err(ForwardError::Api {
            status: status.as_u16(),
            message,
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| ForwardError::InvalidResponse(e.to_string()))
}
