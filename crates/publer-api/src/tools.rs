//! Tool implementations: validate input, call the job tracker or optimizer, shape the reply.

use crate::auth::{upstream_headers, Credentials};
use crate::content::{adapt_for_platform, performance_estimate, strategy_description};
use crate::error::ToolError;
use crate::server::AppState;
use chrono::{DateTime, FixedOffset, Utc};
use publer_jobs::{JobBatch, JobReport, Submission};
use publer_optimizer::{
    parse_timezone, select_schedule_time, DateRange, OptimizationGoal, Recommendation,
    TimeOptimizer,
};
use publer_types::{Forwarder, Headers};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SCHEDULE_ENDPOINT: &str = "posts/schedule";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostInput {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SchedulePostRequest {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub posts: Vec<PostInput>,
    /// Wait inline for the job to finish instead of returning a trackable id.
    #[serde(default)]
    pub wait: bool,
    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct OptimalTimeRequest {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub target_platforms: Vec<String>,
    #[serde(default = "default_goal")]
    pub optimization_goal: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_range")]
    pub date_range: String,
    /// Used for any platform whose optimization falls back. Must be in the future.
    #[serde(default)]
    pub fallback_time: Option<String>,
}

fn default_goal() -> String {
    OptimizationGoal::default().as_str().to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_range() -> String {
    DateRange::default().as_str().to_string()
}

/// Body of tools that only need an optional workspace.
#[derive(Debug, Default, Deserialize)]
pub struct WorkspaceRequest {
    #[serde(default)]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub job_id: String,
    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub job_ids: Vec<String>,
    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
}

pub(crate) fn api_key(creds: &Credentials) -> Result<&str, ToolError> {
    creds.api_key().ok_or_else(|| {
        ToolError::Unauthenticated(
            "Missing API key. Please provide x-api-key header or Authorization: Bearer <key>"
                .to_string(),
        )
    })
}

pub(crate) fn workspace(workspace_id: Option<&str>) -> Result<&str, ToolError> {
    workspace_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ToolError::validation(
                "Missing workspace_id parameter. This operation requires a workspace ID.",
                "Provide a valid workspace_id parameter",
            )
        })
}

fn job_id(raw: &str) -> Result<&str, ToolError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ToolError::validation(
            "job_id is required",
            "Provide the job_id returned by a scheduling tool",
        ));
    }
    Ok(id)
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Internal(e.to_string()))
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Validate and normalize posts into the upstream `{"posts": [...]}` payload.
fn schedule_payload(posts: &[PostInput]) -> Result<Value, ToolError> {
    if posts.is_empty() {
        return Err(ToolError::validation(
            "At least one post is required",
            "Provide posts with content and target accounts",
        ));
    }
    let mut out = Vec::with_capacity(posts.len());
    for (i, post) in posts.iter().enumerate() {
        if post.content.trim().is_empty() {
            return Err(ToolError::validation(
                format!("Post {} content cannot be empty", i + 1),
                "Provide content text for the posts",
            ));
        }
        if post.accounts.is_empty() {
            return Err(ToolError::validation(
                format!("Post {} must target at least one account", i + 1),
                "Specify platform account IDs to post to",
            ));
        }
        let invalid: Vec<&str> = post
            .media_urls
            .iter()
            .map(String::as_str)
            .filter(|u| !is_http_url(u))
            .collect();
        if !invalid.is_empty() {
            return Err(ToolError::validation(
                format!("Invalid media URLs: {}", invalid.join(", ")),
                "Provide valid HTTP/HTTPS URLs for media",
            ));
        }
        let scheduled_time = match post.scheduled_time.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| {
                        ToolError::validation(
                            format!("Invalid scheduled_time format: '{}'", raw),
                            "Use ISO format like '2024-01-15T10:00:00Z'",
                        )
                    })?
                    .to_rfc3339(),
            ),
        };
        out.push(json!({
            "content": post.content,
            "accounts": post.accounts,
            "media_urls": post.media_urls,
            "scheduled_time": scheduled_time,
        }));
    }
    Ok(json!({ "posts": out }))
}

pub async fn schedule_post(
    state: &AppState,
    creds: &Credentials,
    req: SchedulePostRequest,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let workspace_id = workspace(req.workspace_id.as_deref())?;
    let payload = schedule_payload(&req.posts)?;
    let headers = upstream_headers(key, Some(workspace_id));

    let mut body = if req.wait {
        let opts = state.config.poll_options(req.timeout, req.poll_interval);
        let outcome = state
            .tracker
            .submit_and_wait(SCHEDULE_ENDPOINT, &headers, &payload, opts)
            .await;
        to_json(&outcome)?
    } else {
        let timeout = req
            .timeout
            .map(std::time::Duration::from_secs)
            .unwrap_or(state.config.job_timeout);
        let submission = state
            .tracker
            .submit_job(SCHEDULE_ENDPOINT, &headers, &payload, timeout)
            .await;
        to_json(&submission)?
    };
    if let Some(obj) = body.as_object_mut() {
        obj.insert("posts_count".to_string(), json!(req.posts.len()));
    }
    Ok(body)
}

/// An active upstream account a post can target.
#[derive(Debug, Clone, Serialize)]
struct Account {
    id: String,
    platform: String,
    name: String,
}

pub(crate) fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Fallback time supplied by the caller, if any. Rejects malformed and past instants.
fn parse_fallback_time(
    raw: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<FixedOffset>>, ToolError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };
    let at = DateTime::parse_from_rfc3339(raw).map_err(|_| {
        ToolError::validation(
            format!("Invalid fallback_time format: '{}'", raw),
            "Use ISO format like '2024-01-15T10:00:00Z'",
        )
    })?;
    if at <= now {
        return Err(ToolError::validation(
            "Fallback time must be in the future",
            "Provide a future datetime for fallback_time",
        ));
    }
    Ok(Some(at))
}

fn apply_fallback_time(recommendations: &mut [Recommendation], at: DateTime<FixedOffset>) {
    for rec in recommendations.iter_mut().filter(|r| r.is_fallback) {
        rec.optimal_time = at;
        rec.reasoning = format!("Caller-supplied fallback time for {}", rec.platform);
    }
}

fn active_accounts(response: &Value) -> Vec<Account> {
    response
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter(|a| a.get("status").and_then(Value::as_str) == Some("active"))
        .filter_map(|a| {
            let field = |k: &str, default: &str| {
                a.get(k)
                    .and_then(Value::as_str)
                    .unwrap_or(default)
                    .to_string()
            };
            Some(Account {
                id: a.get("id").and_then(id_string)?,
                platform: field("type", "unknown"),
                name: field("name", "Unknown"),
            })
        })
        .collect()
}

pub async fn optimal_time_scheduler(
    state: &AppState,
    creds: &Credentials,
    req: OptimalTimeRequest,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let workspace_id = workspace(req.workspace_id.as_deref())?;
    if req.content.trim().is_empty() {
        return Err(ToolError::validation(
            "Content cannot be empty",
            "Provide content text for the post",
        ));
    }
    if req.target_platforms.is_empty() {
        return Err(ToolError::validation(
            "At least one target platform is required",
            "Specify platform account IDs to analyze and post to",
        ));
    }
    let goal: OptimizationGoal = req
        .optimization_goal
        .parse()
        .map_err(|e: publer_optimizer::InputError| {
            ToolError::validation(e.to_string(), "Choose a valid optimization goal")
        })?;
    let tz = parse_timezone(&req.timezone).map_err(|e| {
        ToolError::validation(
            e.to_string(),
            "Use a valid timezone like 'America/New_York', 'Europe/London', or 'UTC'",
        )
    })?;
    let range: DateRange = req.date_range.parse().map_err(|e: publer_optimizer::InputError| {
        ToolError::validation(e.to_string(), "Choose a valid date range for scheduling")
    })?;
    let fallback_time = parse_fallback_time(req.fallback_time.as_deref(), Utc::now())?;

    let headers = upstream_headers(key, Some(workspace_id));
    let forwarder = state.tracker.forwarder();
    let accounts = active_accounts(&forwarder.get("accounts", &headers, None).await?);

    let mut targets = Vec::with_capacity(req.target_platforms.len());
    let mut unknown = Vec::new();
    for id in &req.target_platforms {
        match accounts.iter().find(|a| &a.id == id) {
            Some(account) => targets.push(account),
            None => unknown.push(id.as_str()),
        }
    }
    if !unknown.is_empty() {
        return Err(ToolError::validation(
            format!("Invalid or disconnected platform IDs: {}", unknown.join(", ")),
            "Use the accounts listed in available_accounts",
        )
        .with_detail("available_accounts", to_json(&accounts)?));
    }

    let analytics = match forwarder.get("analytics/members", &headers, None).await {
        Ok(response) => response.get("data").cloned().unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(error = %e, "analytics unavailable, optimizing without history");
            Value::Null
        }
    };

    let optimizer = TimeOptimizer::new(tz, goal);
    let mut recommendations: Vec<_> = targets
        .iter()
        .map(|account| {
            optimizer.find_optimal_time(&account.platform, analytics.get(&account.id), range)
        })
        .collect();
    if let Some(at) = fallback_time {
        apply_fallback_time(&mut recommendations, at);
    }
    let selected = select_schedule_time(&recommendations, goal)
        .ok_or_else(|| ToolError::Internal("no recommendation produced".to_string()))?;
    let selected_time = selected.to_rfc3339();

    let posts: Vec<Value> = targets
        .iter()
        .map(|account| {
            json!({
                "content": adapt_for_platform(&account.platform, &req.content),
                "accounts": [account.id],
                "scheduled_time": selected_time,
            })
        })
        .collect();
    let submission = state
        .tracker
        .submit_job(
            SCHEDULE_ENDPOINT,
            &headers,
            &json!({ "posts": posts }),
            state.config.job_timeout,
        )
        .await;
    let job_id = match submission.job_id() {
        Some(id) => id.to_string(),
        None => return to_json(&submission),
    };

    let average_confidence = recommendations.iter().map(|r| r.confidence).sum::<f64>()
        / recommendations.len() as f64;
    let average_confidence = (average_confidence * 100.0).round() / 100.0;
    let data_points_used: usize = targets
        .iter()
        .filter_map(|a| analytics.get(&a.id))
        .filter_map(|a| a.get("recent_posts").and_then(Value::as_array))
        .map(Vec::len)
        .sum();

    let mut recommended_times = Vec::with_capacity(targets.len());
    let mut scheduled_posts = Vec::with_capacity(targets.len());
    for (account, rec) in targets.iter().zip(&recommendations) {
        let mut entry = to_json(rec)?;
        if let Some(obj) = entry.as_object_mut() {
            obj.insert("account_id".to_string(), json!(account.id));
            obj.insert("account_name".to_string(), json!(account.name));
        }
        recommended_times.push(entry);
        scheduled_posts.push(json!({
            "platform": account.platform,
            "account_id": account.id,
            "account_name": account.name,
            "scheduled_time": selected_time,
            "platform_optimal_time": rec.optimal_time.to_rfc3339(),
            "confidence": rec.confidence,
            "reasoning": rec.reasoning,
        }));
    }

    tracing::info!(
        job_id = %job_id,
        goal = %goal,
        platforms = targets.len(),
        selected_time = %selected_time,
        "optimized job submitted"
    );

    Ok(json!({
        "status": "optimized_job_submitted",
        "job_id": job_id,
        "was_immediate": matches!(submission, Submission::Immediate { .. }),
        "optimization_results": {
            "selected_time": selected_time,
            "optimization_goal": goal,
            "timezone": req.timezone,
            "date_range": range,
            "average_confidence": average_confidence,
            "platforms_analyzed": targets.len(),
            "data_points_used": data_points_used,
            "recommended_times": recommended_times,
        },
        "scheduled_posts": scheduled_posts,
        "summary": {
            "total_platforms": targets.len(),
            "selected_strategy": strategy_description(goal, &selected),
            "estimated_performance": performance_estimate(average_confidence, goal),
        },
    }))
}

pub async fn check_job_status(
    state: &AppState,
    creds: &Credentials,
    req: JobRequest,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let id = job_id(&req.job_id)?;
    let headers = upstream_headers(key, req.workspace_id.as_deref());
    let endpoint = format!("job_status/{}", id);

    match state.tracker.forwarder().get(&endpoint, &headers, None).await {
        Ok(payload) => to_json(&JobReport::from_status(id, &payload)),
        Err(e) if e.is_not_found() => Ok(json!({
            "status": "job_not_found",
            "job_id": id,
            "error": format!("Job {} not found", id),
            "action_required": "Verify the job_id returned by a scheduling tool",
        })),
        Err(e) => Err(e.into()),
    }
}

pub async fn wait_for_job(
    state: &AppState,
    creds: &Credentials,
    req: JobRequest,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let id = job_id(&req.job_id)?;
    let headers = upstream_headers(key, req.workspace_id.as_deref());
    let opts = state.config.poll_options(req.timeout, req.poll_interval);
    let outcome = state.tracker.poll_job_completion(id, &headers, opts).await;
    to_json(&outcome)
}

pub async fn poll_batch(
    state: &AppState,
    creds: &Credentials,
    req: BatchRequest,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let job_ids: Vec<String> = req
        .job_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if job_ids.is_empty() {
        return Err(ToolError::validation(
            "At least one job_id is required",
            "Provide the job_ids returned by scheduling tools",
        ));
    }
    let headers: Headers = upstream_headers(key, req.workspace_id.as_deref());
    let opts = state
        .config
        .batch_poll_options(req.timeout, req.poll_interval);

    let mut batch = match req.batch_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => JobBatch::new(id, job_ids),
        None => JobBatch::with_generated_id(job_ids),
    };
    let summary = batch.poll_all_jobs(&state.tracker, &headers, opts).await;
    to_json(&summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(content: &str, accounts: &[&str]) -> PostInput {
        PostInput {
            content: content.to_string(),
            accounts: accounts.iter().map(|a| a.to_string()).collect(),
            media_urls: Vec::new(),
            scheduled_time: None,
        }
    }

    #[test]
    fn payload_normalizes_times() {
        let mut p = post("hello", &["a1"]);
        p.scheduled_time = Some("2024-01-15T10:00:00Z".to_string());
        let payload = schedule_payload(&[p, post("later", &["a2"])]).unwrap();
        assert_eq!(payload["posts"][0]["scheduled_time"], "2024-01-15T10:00:00+00:00");
        assert!(payload["posts"][1]["scheduled_time"].is_null());
        assert_eq!(payload["posts"][1]["accounts"][0], "a2");
    }

    #[test]
    fn payload_validation() {
        let err = schedule_payload(&[]).unwrap_err();
        assert_eq!(err.status(), "validation_failed");

        let err = schedule_payload(&[post("  ", &["a1"])]).unwrap_err();
        assert_eq!(err.to_string(), "Post 1 content cannot be empty");

        let err = schedule_payload(&[post("ok", &["a1"]), post("ok", &[])]).unwrap_err();
        assert_eq!(err.to_string(), "Post 2 must target at least one account");

        let mut p = post("ok", &["a1"]);
        p.media_urls = vec!["ftp://x/y.png".to_string()];
        assert!(schedule_payload(&[p]).unwrap_err().to_string().contains("ftp://x/y.png"));

        let mut p = post("ok", &["a1"]);
        p.scheduled_time = Some("tomorrow".to_string());
        assert!(schedule_payload(&[p]).unwrap_err().to_string().contains("tomorrow"));
    }

    #[test]
    fn fallback_time_must_be_future_iso() {
        let now = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_fallback_time(None, now).unwrap(), None);
        assert_eq!(parse_fallback_time(Some(" "), now).unwrap(), None);

        let at = parse_fallback_time(Some("2024-01-16T09:00:00+01:00"), now).unwrap();
        assert_eq!(at.unwrap().to_rfc3339(), "2024-01-16T09:00:00+01:00");

        let err = parse_fallback_time(Some("2024-01-15T10:00:00Z"), now).unwrap_err();
        assert_eq!(err.to_string(), "Fallback time must be in the future");
        let err = parse_fallback_time(Some("next week"), now).unwrap_err();
        assert_eq!(err.to_string(), "Invalid fallback_time format: 'next week'");
    }

    #[test]
    fn fallback_time_replaces_only_fallback_recommendations() {
        let rec = |platform: &str, is_fallback: bool| Recommendation {
            platform: platform.to_string(),
            optimal_time: DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z").unwrap(),
            confidence: 0.6,
            expected_engagement: "medium",
            reasoning: "scored".to_string(),
            alternative_times: Vec::new(),
            component_scores: None,
            analysis_factors: None,
            is_fallback,
            error: None,
        };
        let mut recs = vec![rec("twitter", false), rec("linkedin", true)];
        let at = DateTime::parse_from_rfc3339("2024-01-20T08:00:00Z").unwrap();
        apply_fallback_time(&mut recs, at);
        assert_eq!(recs[0].optimal_time.to_rfc3339(), "2024-01-15T12:00:00+00:00");
        assert_eq!(recs[0].reasoning, "scored");
        assert_eq!(recs[1].optimal_time, at);
        assert_eq!(recs[1].reasoning, "Caller-supplied fallback time for linkedin");
    }

    #[test]
    fn only_active_accounts_with_ids() {
        let response = json!({ "data": [
            { "id": 11, "status": "active", "type": "twitter", "name": "Brand" },
            { "id": "22", "status": "disconnected", "type": "linkedin" },
            { "status": "active", "type": "facebook" },
            { "id": "33", "status": "active" }
        ]});
        let accounts = active_accounts(&response);
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "11");
        assert_eq!(accounts[1].platform, "unknown");
        assert_eq!(accounts[1].name, "Unknown");
    }
}
