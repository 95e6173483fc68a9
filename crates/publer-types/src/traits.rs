//! Forwarding capability: the minimal upstream HTTP interface the core depends on.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Request headers forwarded upstream (already carrying credentials).
pub type Headers = HashMap<String, String>;

/// Query parameters for GET requests.
pub type QueryParams = HashMap<String, Value>;

/// Failure signals raised by a [`Forwarder`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    /// HTTP 401/403.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// HTTP 429.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    /// Any other status >= 400.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    /// Transport failure (connect, timeout) after the client's own retries.
    #[error("network error: {0}")]
    Network(String),
    /// Success status with a body that is not JSON.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

impl ForwardError {
    /// True when the error carries "resource is gone" semantics.
    ///
    /// There is no dedicated not-found variant: upstream 404s arrive as `Api { status: 404 }`,
    /// and some deployments only report it inside the message.
    pub fn is_not_found(&self) -> bool {
        match self {
            ForwardError::Api { status: 404, .. } => true,
            ForwardError::Api { message, .. } => {
                message.contains("404") || message.to_lowercase().contains("not found")
            }
            _ => false,
        }
    }
}

/// Upstream HTTP forwarding (GET/POST returning JSON).
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// GET `endpoint` with optional query params.
    async fn get(
        &self,
        endpoint: &str,
        headers: &Headers,
        params: Option<&QueryParams>,
    ) -> Result<Value, ForwardError>;

    /// POST `endpoint` with an optional JSON body.
    async fn post(
        &self,
        endpoint: &str,
        headers: &Headers,
        body: Option<&Value>,
    ) -> Result<Value, ForwardError>;
}
