//! Recent job monitoring built on the upstream post list.

use crate::auth::{upstream_headers, Credentials};
use crate::error::ToolError;
use crate::server::AppState;
use crate::tools::{api_key, id_string, to_json, workspace};
use chrono::{DateTime, Duration, Utc};
use publer_types::QueryParams;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

const MAX_LIMIT: usize = 50;
const PREVIEW_CHARS: usize = 100;

/// In-progress jobs older than this are flagged as possibly stuck.
const STUCK_AFTER_HOURS: i64 = 2;

#[derive(Debug, Deserialize)]
pub struct MonitorRequest {
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_status_filter")]
    pub status_filter: String,
    #[serde(default = "default_time_range")]
    pub time_range: String,
}

fn default_limit() -> usize {
    10
}

fn default_status_filter() -> String {
    "all".to_string()
}

fn default_time_range() -> String {
    TimeRange::Day.as_str().to_string()
}

/// Job state inferred from an upstream post status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoredStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Failed,
}

impl MonitoredStatus {
    fn from_post_status(status: &str) -> Self {
        match status {
            "published" => MonitoredStatus::Completed,
            "scheduled" | "pending" => MonitoredStatus::Scheduled,
            "failed" | "error" => MonitoredStatus::Failed,
            "processing" | "uploading" => MonitoredStatus::InProgress,
            _ => MonitoredStatus::Pending,
        }
    }
}

/// `None` means no filtering.
fn parse_status_filter(raw: &str) -> Result<Option<MonitoredStatus>, ToolError> {
    match raw {
        "all" => Ok(None),
        "pending" => Ok(Some(MonitoredStatus::Pending)),
        "scheduled" => Ok(Some(MonitoredStatus::Scheduled)),
        "in_progress" => Ok(Some(MonitoredStatus::InProgress)),
        "completed" => Ok(Some(MonitoredStatus::Completed)),
        "failed" => Ok(Some(MonitoredStatus::Failed)),
        other => Err(ToolError::validation(
            format!(
                "Invalid status filter '{}'. Must be one of: all, pending, completed, failed, \
                 in_progress, scheduled",
                other
            ),
            "Choose a valid status filter",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Hour,
    SixHours,
    Day,
    Week,
    Month,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Hour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
        }
    }

    pub fn lookback(&self) -> Duration {
        match self {
            TimeRange::Hour => Duration::hours(1),
            TimeRange::SixHours => Duration::hours(6),
            TimeRange::Day => Duration::hours(24),
            TimeRange::Week => Duration::days(7),
            TimeRange::Month => Duration::days(30),
        }
    }
}

impl FromStr for TimeRange {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeRange::Hour),
            "6h" => Ok(TimeRange::SixHours),
            "24h" => Ok(TimeRange::Day),
            "7d" => Ok(TimeRange::Week),
            "30d" => Ok(TimeRange::Month),
            other => Err(ToolError::validation(
                format!(
                    "Invalid time range '{}'. Must be one of: 1h, 6h, 24h, 7d, 30d",
                    other
                ),
                "Choose a valid time range",
            )),
        }
    }
}

/// Which scheduling flow most likely produced a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    MultiPlatformScheduler,
    BlogToTwitterScheduler,
    BulkContentSeriesScheduler,
    OptimalTimeScheduler,
    ManualPost,
}

fn array_len(post: &Value, key: &str) -> usize {
    post.get(key).and_then(Value::as_array).map_or(0, Vec::len)
}

fn is_truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Bool(true)) => true,
    }
}

fn infer_job_kind(post: &Value) -> JobKind {
    let content = post
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    let links_article =
        content.contains("http") && (content.contains("blog") || content.contains("article"));
    if array_len(post, "accounts") > 1 {
        JobKind::MultiPlatformScheduler
    } else if links_article {
        JobKind::BlogToTwitterScheduler
    } else if array_len(post, "media_urls") > 1 {
        JobKind::BulkContentSeriesScheduler
    } else if is_truthy(post.get("optimization_data")) {
        JobKind::OptimalTimeScheduler
    } else {
        JobKind::ManualPost
    }
}

fn created_at(post: &Value) -> Option<DateTime<Utc>> {
    post.get("created_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let mut cut: String = content.chars().take(PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        content.to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoredJob {
    pub job_id: String,
    pub job_type: JobKind,
    pub status: MonitoredStatus,
    pub created_at: String,
    pub platforms: Vec<String>,
    pub posts_count: usize,
    pub content_preview: String,
    pub scheduled_time: Value,
    pub error_message: Option<String>,
}

impl MonitoredJob {
    fn from_post(index: usize, post: &Value) -> Self {
        let status = MonitoredStatus::from_post_status(
            post.get("status").and_then(Value::as_str).unwrap_or("unknown"),
        );
        let platforms = post
            .get("accounts")
            .and_then(Value::as_array)
            .map(|accounts| {
                accounts
                    .iter()
                    .map(|a| {
                        a.get("platform")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string()
                    })
                    .collect()
            })
            .unwrap_or_default();
        let error_message = match status {
            MonitoredStatus::Failed => post
                .get("error_message")
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        };
        Self {
            job_id: post
                .get("id")
                .and_then(id_string)
                .unwrap_or_else(|| format!("post_{}", index)),
            job_type: infer_job_kind(post),
            status,
            created_at: post
                .get("created_at")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            platforms,
            posts_count: 1,
            content_preview: preview(
                post.get("content").and_then(Value::as_str).unwrap_or_default(),
            ),
            scheduled_time: post.get("scheduled_time").cloned().unwrap_or(Value::Null),
            error_message,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub scheduled: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: MonitoredStatus) {
        let slot = match status {
            MonitoredStatus::Pending => &mut self.pending,
            MonitoredStatus::Scheduled => &mut self.scheduled,
            MonitoredStatus::InProgress => &mut self.in_progress,
            MonitoredStatus::Completed => &mut self.completed,
            MonitoredStatus::Failed => &mut self.failed,
        };
        *slot += 1;
    }
}

/// Result of scanning recent posts.
#[derive(Debug, Clone)]
pub struct JobScan {
    pub jobs: Vec<MonitoredJob>,
    pub counts: StatusCounts,
    pub attention_needed: Vec<Value>,
}

impl JobScan {
    /// Completed share of the listed jobs as a whole percentage.
    pub fn success_rate(&self) -> u64 {
        if self.jobs.is_empty() {
            return 0;
        }
        (self.counts.completed as f64 / self.jobs.len() as f64 * 100.0).round() as u64
    }
}

/// Posts created before the lookback window are skipped; posts without a parseable
/// `created_at` are kept. At most `limit` posts are examined before the status filter.
pub fn scan_posts(
    posts: &[Value],
    limit: usize,
    filter: Option<MonitoredStatus>,
    range: TimeRange,
    now: DateTime<Utc>,
) -> JobScan {
    let since = now - range.lookback();
    let stuck_before = now - Duration::hours(STUCK_AFTER_HOURS);

    let mut jobs = Vec::new();
    let mut counts = StatusCounts::default();
    let mut attention_needed = Vec::new();

    let recent = posts
        .iter()
        .filter(|post| created_at(post).map_or(true, |t| t >= since))
        .take(limit)
        .enumerate();
    for (index, post) in recent {
        let job = MonitoredJob::from_post(index, post);
        if filter.is_some_and(|f| f != job.status) {
            continue;
        }
        counts.record(job.status);
        let stuck = created_at(post).is_some_and(|t| t < stuck_before);
        match job.status {
            MonitoredStatus::Failed => attention_needed.push(json!({
                "job_id": job.job_id,
                "reason": "Job failed",
                "error": job.error_message.as_deref().unwrap_or("Unknown error"),
                "action": "Check job details and retry if needed",
            })),
            MonitoredStatus::InProgress if stuck => attention_needed.push(json!({
                "job_id": job.job_id,
                "reason": "Job running too long",
                "action": "Check if job is stuck",
            })),
            _ => {}
        }
        jobs.push(job);
    }

    JobScan {
        jobs,
        counts,
        attention_needed,
    }
}

fn posts_in(response: &Value) -> Vec<Value> {
    match response {
        Value::Array(items) => items.clone(),
        other => other
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    }
}

pub async fn monitor_recent_jobs(
    state: &AppState,
    creds: &Credentials,
    req: MonitorRequest,
) -> Result<Value, ToolError> {
    let key = api_key(creds)?;
    let workspace_id = workspace(req.workspace_id.as_deref())?;
    if !(1..=MAX_LIMIT).contains(&req.limit) {
        return Err(ToolError::validation(
            format!("limit must be between 1 and {}, got {}", MAX_LIMIT, req.limit),
            "Choose a limit between 1 and 50",
        ));
    }
    let filter = parse_status_filter(&req.status_filter)?;
    let range: TimeRange = req.time_range.parse()?;

    let now = Utc::now();
    let headers = upstream_headers(key, Some(workspace_id));
    let mut params = QueryParams::new();
    params.insert("limit".to_string(), json!(req.limit * 2));
    params.insert("since".to_string(), json!((now - range.lookback()).to_rfc3339()));

    let posts = match state
        .tracker
        .forwarder()
        .get("posts", &headers, Some(&params))
        .await
    {
        Ok(response) => posts_in(&response),
        Err(e) if e.is_not_found() => {
            tracing::debug!(error = %e, "posts endpoint unavailable, reporting no jobs");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let scan = scan_posts(&posts, req.limit, filter, range, now);
    tracing::info!(
        jobs = scan.jobs.len(),
        failed = scan.counts.failed,
        time_range = range.as_str(),
        "recent jobs scanned"
    );

    let counts = &scan.counts;
    Ok(json!({
        "status": "success",
        "recent_jobs": to_json(&scan.jobs)?,
        "summary": {
            "total_jobs": scan.jobs.len(),
            "pending": counts.pending,
            "scheduled": counts.scheduled,
            "in_progress": counts.in_progress,
            "completed": counts.completed,
            "failed": counts.failed,
            "success_rate": format!("{}%", scan.success_rate()),
            "time_range": range.as_str(),
            "jobs_needing_attention": scan.attention_needed.len(),
        },
        "filters_applied": {
            "status_filter": req.status_filter,
            "time_range": range.as_str(),
            "limit": req.limit,
        },
        "attention_needed": scan.attention_needed,
    }))
}
