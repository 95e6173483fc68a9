//! Account and connected-platform inspection.

use crate::auth::{upstream_headers, Credentials};
use crate::error::ToolError;
use crate::server::AppState;
use crate::tools::{api_key, id_string, workspace};
use publer_types::ForwardError;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Content types a platform accepts. Unknown platforms get text and images.
pub fn posting_capabilities(platform: &str) -> &'static [&'static str] {
    match platform.to_ascii_lowercase().as_str() {
        "facebook" => &["text", "image", "video", "link", "carousel"],
        "instagram" => &["image", "video", "carousel", "story"],
        "twitter" => &["text", "image", "video", "thread"],
        "linkedin" => &["text", "image", "video", "article", "document"],
        "pinterest" => &["image", "video"],
        "youtube" => &["video", "shorts"],
        "tiktok" => &["video"],
        _ => &["text", "image"],
    }
}

/// Items of a list response, which arrives either bare or under `data`.
fn items(response: &Value) -> &[Value] {
    response
        .as_array()
        .or_else(|| response.get("data").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text<'a>(v: &'a Value, key: &str, default: &'a str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn field(v: &Value, key: &str) -> Value {
    v.get(key).cloned().unwrap_or(Value::Null)
}

fn integration_status(error: &ToolError) -> Value {
    let (authentication, api_connectivity) = match error {
        ToolError::Unauthenticated(_) | ToolError::Upstream(ForwardError::Authentication(_)) => {
            ("failed", "failed")
        }
        ToolError::Upstream(ForwardError::RateLimited(_)) => ("unknown", "throttled"),
        ToolError::Upstream(_) => ("unknown", "error"),
        ToolError::Validation { .. } | ToolError::Internal(_) => ("unknown", "failed"),
    };
    json!({
        "authentication": authentication,
        "api_connectivity": api_connectivity,
    })
}

/// Error body with an extra top-level field.
fn failure(tool: &'static str, error: ToolError, key: &str, extra: Value) -> Value {
    tracing::warn!(tool, status = error.status(), error = %error, "tool call failed");
    let mut body = error.to_json();
    if let Some(obj) = body.as_object_mut() {
        obj.insert(key.to_string(), extra);
    }
    body
}

/// Verify the key against `users/me` and list the workspaces it can reach. Failures carry an
/// `integration_status` describing which layer broke.
pub async fn check_account_status(
    state: &AppState,
    creds: &Credentials,
    workspace_id: Option<&str>,
) -> Value {
    match account_status(state, creds, workspace_id).await {
        Ok(body) => body,
        Err(e) => {
            let status = integration_status(&e);
            failure("check_account_status", e, "integration_status", status)
        }
    }
}

async fn account_status(
    state: &AppState,
    creds: &Credentials,
    workspace_id: Option<&str>,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let headers = upstream_headers(key, None);
    let forwarder = state.tracker.forwarder();
    let user = forwarder.get("users/me", &headers, None).await?;
    let workspaces = forwarder.get("workspaces", &headers, None).await?;
    let workspaces = items(&workspaces);

    let workspace_list: Vec<Value> = workspaces
        .iter()
        .map(|ws| {
            json!({
                "id": field(ws, "id"),
                "name": field(ws, "name"),
                "role": text(ws, "role", "unknown"),
            })
        })
        .collect();

    Ok(json!({
        "status": "connected",
        "account": {
            "user_id": field(&user, "id"),
            "email": field(&user, "email"),
            "name": field(&user, "name"),
            "account_type": text(&user, "account_type", "unknown"),
        },
        "workspaces": {
            "available_workspaces": workspace_list.len(),
            "workspace_list": workspace_list,
            "provided_workspace_id": workspace_id,
        },
        "integration_status": {
            "authentication": "success",
            "api_connectivity": "operational",
        },
    }))
}

/// One connected social account.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedPlatform {
    pub account_id: Option<String>,
    pub platform: String,
    pub account_name: String,
    pub status: String,
    pub is_active: bool,
    pub posting_capabilities: Vec<&'static str>,
    pub profile_info: Value,
}

impl ConnectedPlatform {
    fn from_account(account: &Value) -> Self {
        let platform = text(account, "type", "unknown").to_string();
        let status = text(account, "status", "unknown").to_string();
        Self {
            account_id: account.get("id").and_then(id_string),
            posting_capabilities: posting_capabilities(&platform).to_vec(),
            account_name: text(account, "name", "Unnamed Account").to_string(),
            is_active: status == "active",
            profile_info: json!({
                "username": field(account, "username"),
                "profile_picture": field(account, "profile_picture"),
                "follower_count": field(account, "follower_count"),
            }),
            platform,
            status,
        }
    }
}

/// Sorted union of the capabilities of active platforms.
fn supported_content_types(platforms: &[ConnectedPlatform]) -> Vec<&'static str> {
    platforms
        .iter()
        .filter(|p| p.is_active)
        .flat_map(|p| p.posting_capabilities.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every account connected to the workspace, active or not, with what it can publish.
pub async fn list_connected_platforms(
    state: &AppState,
    creds: &Credentials,
    workspace_id: Option<&str>,
) -> Value {
    match connected_platforms(state, creds, workspace_id).await {
        Ok(body) => body,
        Err(e) => failure("list_connected_platforms", e, "platforms", json!([])),
    }
}

async fn connected_platforms(
    state: &AppState,
    creds: &Credentials,
    workspace_id: Option<&str>,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let workspace_id = workspace(workspace_id)?;
    let headers = upstream_headers(key, Some(workspace_id));
    let response = state
        .tracker
        .forwarder()
        .get("accounts", &headers, None)
        .await?;

    let platforms: Vec<ConnectedPlatform> = items(&response)
        .iter()
        .map(ConnectedPlatform::from_account)
        .collect();
    if platforms.is_empty() {
        return Ok(json!({
            "status": "no_platforms_connected",
            "message": "No social media platforms are currently connected to your workspace.",
            "platforms": [],
            "summary": {
                "total_platforms": 0,
                "active_platforms": 0,
                "platforms_by_type": {},
            },
        }));
    }

    let active = platforms.iter().filter(|p| p.is_active).count();
    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for p in &platforms {
        *by_type.entry(p.platform.as_str()).or_default() += 1;
    }

    Ok(json!({
        "status": "success",
        "summary": {
            "total_platforms": platforms.len(),
            "active_platforms": active,
            "inactive_platforms": platforms.len() - active,
            "platforms_by_type": by_type,
            "supported_content_types": supported_content_types(&platforms),
        },
        "platforms": platforms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_are_case_insensitive_with_default() {
        assert_eq!(posting_capabilities("TikTok"), &["video"]);
        assert_eq!(posting_capabilities("mastodon"), &["text", "image"]);
    }

    #[test]
    fn content_types_come_from_active_platforms_only() {
        let platforms: Vec<ConnectedPlatform> = [
            json!({ "id": 1, "type": "pinterest", "status": "active" }),
            json!({ "id": 2, "type": "youtube", "status": "active" }),
            json!({ "id": 3, "type": "twitter", "status": "expired" }),
        ]
        .iter()
        .map(ConnectedPlatform::from_account)
        .collect();
        assert_eq!(
            supported_content_types(&platforms),
            vec!["image", "shorts", "video"]
        );
        assert_eq!(platforms[2].account_id.as_deref(), Some("3"));
        assert!(!platforms[2].is_active);
    }

    #[test]
    fn account_defaults() {
        let p = ConnectedPlatform::from_account(&json!({}));
        assert_eq!(p.account_id, None);
        assert_eq!(p.platform, "unknown");
        assert_eq!(p.account_name, "Unnamed Account");
        assert_eq!(p.status, "unknown");
        assert!(p.profile_info["username"].is_null());
    }

    #[test]
    fn list_responses_bare_or_wrapped() {
        assert_eq!(items(&json!([1, 2])).len(), 2);
        assert_eq!(items(&json!({ "data": [1] })).len(), 1);
        assert!(items(&json!({ "id": 1 })).is_empty());
    }

    #[test]
    fn integration_status_names_the_broken_layer() {
        let auth = integration_status(&ToolError::Upstream(ForwardError::Authentication(
            "bad".into(),
        )));
        assert_eq!(auth["authentication"], "failed");
        let limited =
            integration_status(&ToolError::Upstream(ForwardError::RateLimited("slow".into())));
        assert_eq!(limited["api_connectivity"], "throttled");
        let network = integration_status(&ToolError::Upstream(ForwardError::Network("x".into())));
        assert_eq!(network["api_connectivity"], "error");
    }
}
