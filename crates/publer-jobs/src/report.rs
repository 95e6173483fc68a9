//! Summaries of raw job status payloads.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_posts: usize,
    pub successful_posts: usize,
    pub failed_posts: usize,
    pub success_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTiming {
    pub created_at: Option<Value>,
    pub completed_at: Option<Value>,
    pub duration: Option<Value>,
}

/// Standardized view of a `job_status/{id}` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub status: String,
    pub summary: ReportSummary,
    pub results: Vec<Value>,
    pub errors: Vec<Value>,
    pub timing: ReportTiming,
    pub raw_result: Value,
}

impl JobReport {
    /// Build a report from a status payload. Missing fields default to empty/unknown.
    pub fn from_status(job_id: &str, payload: &Value) -> Self {
        let results = array_field(payload, "results");
        let errors = array_field(payload, "errors");

        let count_status = |wanted: &str| {
            results
                .iter()
                .filter(|r| r.get("status").and_then(Value::as_str) == Some(wanted))
                .count()
        };
        let total_posts = results.len();
        let successful_posts = count_status("published");
        let failed_posts = count_status("failed");
        let success_rate = if total_posts > 0 {
            ((successful_posts as f64 / total_posts as f64) * 100.0).round() as u32
        } else {
            0
        };

        Self {
            job_id: payload
                .get("job_id")
                .and_then(Value::as_str)
                .unwrap_or(job_id)
                .to_string(),
            status: payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            summary: ReportSummary {
                total_posts,
                successful_posts,
                failed_posts,
                success_rate,
            },
            results,
            errors,
            timing: ReportTiming {
                created_at: payload.get("created_at").cloned(),
                completed_at: payload.get("completed_at").cloned(),
                duration: payload.get("duration").cloned(),
            },
            raw_result: payload.clone(),
        }
    }
}

fn array_field(payload: &Value, key: &str) -> Vec<Value> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_published_and_failed_posts() {
        let payload = json!({
            "status": "completed",
            "results": [
                { "status": "published", "platform": "twitter" },
                { "status": "published", "platform": "linkedin" },
                { "status": "failed", "platform": "instagram" }
            ],
            "errors": ["instagram token expired"],
            "created_at": "2024-01-15T10:00:00Z"
        });
        let report = JobReport::from_status("j9", &payload);
        assert_eq!(report.job_id, "j9");
        assert_eq!(report.status, "completed");
        assert_eq!(report.summary.total_posts, 3);
        assert_eq!(report.summary.successful_posts, 2);
        assert_eq!(report.summary.failed_posts, 1);
        assert_eq!(report.summary.success_rate, 67);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.timing.created_at, Some(json!("2024-01-15T10:00:00Z")));
        assert!(report.timing.completed_at.is_none());
    }

    #[test]
    fn empty_payload_is_unknown_with_zero_rate() {
        let report = JobReport::from_status("j1", &json!({}));
        assert_eq!(report.status, "unknown");
        assert_eq!(report.summary.total_posts, 0);
        assert_eq!(report.summary.success_rate, 0);
    }
}
