//! Tool failures and their in-band JSON form.

use publer_types::ForwardError;
use serde_json::{json, Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{error}")]
    Validation {
        error: String,
        action_required: &'static str,
        /// Extra top-level fields, e.g. the accounts a caller could have used.
        details: Map<String, Value>,
    },
    #[error(transparent)]
    Upstream(#[from] ForwardError),
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    pub fn validation(error: impl Into<String>, action_required: &'static str) -> Self {
        ToolError::Validation {
            error: error.into(),
            action_required,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        if let ToolError::Validation { details, .. } = &mut self {
            details.insert(key.to_string(), value);
        }
        self
    }

    pub fn status(&self) -> &'static str {
        match self {
            ToolError::Unauthenticated(_) => "authentication_failed",
            ToolError::Validation { .. } => "validation_failed",
            ToolError::Upstream(ForwardError::Authentication(_)) => "authentication_failed",
            ToolError::Upstream(ForwardError::RateLimited(_)) => "rate_limited",
            ToolError::Upstream(_) => "api_error",
            ToolError::Internal(_) => "error",
        }
    }

    /// Response body: always a `status` plus an `error`, and either a next step for the caller
    /// or a retry hint.
    pub fn to_json(&self) -> Value {
        let status = self.status();
        match self {
            ToolError::Unauthenticated(msg) => json!({
                "status": status,
                "error": msg,
                "action_required": "Verify x-api-key header",
            }),
            ToolError::Validation {
                error,
                action_required,
                details,
            } => {
                let mut body = Map::new();
                body.insert("status".into(), json!(status));
                body.insert("error".into(), json!(error));
                body.insert("action_required".into(), json!(action_required));
                body.extend(details.clone());
                Value::Object(body)
            }
            ToolError::Upstream(ForwardError::Authentication(msg)) => json!({
                "status": status,
                "error": msg,
                "action_required": "Verify your x-api-key header and workspace permissions",
            }),
            ToolError::Upstream(ForwardError::RateLimited(_)) => json!({
                "status": status,
                "error": "Rate limit exceeded. Publer allows 100 requests per 2 minutes.",
                "action_required": "Wait before retrying. Consider reducing concurrent requests.",
            }),
            ToolError::Upstream(e) => json!({
                "status": status,
                "error": format!("Publer API error: {}", e),
                "retry_recommended": true,
            }),
            ToolError::Internal(msg) => json!({
                "status": status,
                "error": format!("Unexpected error: {}", msg),
                "retry_recommended": true,
            }),
        }
    }
}
