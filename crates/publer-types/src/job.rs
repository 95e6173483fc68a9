//! Job records: submission results, poll outcomes, and the status vocabulary they share.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a tracked job as reported to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Completed,
    Failed,
    JobNotFound,
    Timeout,
    Cancelled,
    SubmissionError,
    ApiError,
    PollingError,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::JobNotFound => "job_not_found",
            JobStatus::Timeout => "timeout",
            JobStatus::Cancelled => "cancelled",
            JobStatus::SubmissionError => "submission_error",
            JobStatus::ApiError => "api_error",
            JobStatus::PollingError => "polling_error",
        }
    }

    /// No further polling happens after a terminal status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Submitted)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of submitting one unit of work upstream. Never an `Err`: failures are variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Submission {
    /// Upstream accepted the work and returned a `job_id` to poll.
    Submitted {
        job_id: String,
        submitted_at: DateTime<Utc>,
        endpoint: String,
        /// Polling timeout in seconds, recorded for later waits.
        timeout: u64,
    },
    /// Upstream finished synchronously; `job_id` is synthesized as `sync_<unix>`.
    #[serde(rename = "submitted")]
    Immediate {
        job_id: String,
        submitted_at: DateTime<Utc>,
        endpoint: String,
        immediate_response: Value,
    },
    SubmissionError {
        error: String,
        endpoint: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },
    ApiError { error: String, endpoint: String },
}

impl Submission {
    pub fn status(&self) -> JobStatus {
        match self {
            Submission::Submitted { .. } | Submission::Immediate { .. } => JobStatus::Submitted,
            Submission::SubmissionError { .. } => JobStatus::SubmissionError,
            Submission::ApiError { .. } => JobStatus::ApiError,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Submission::Submitted { job_id, .. } | Submission::Immediate { job_id, .. } => {
                Some(job_id)
            }
            _ => None,
        }
    }

    pub fn immediate_response(&self) -> Option<&Value> {
        match self {
            Submission::Immediate {
                immediate_response, ..
            } => Some(immediate_response),
            _ => None,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Terminal result of waiting on a job. `polling_time` is in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        job_id: String,
        result: Value,
        polling_time: f64,
        #[serde(skip_serializing_if = "is_false")]
        was_immediate: bool,
    },
    Failed {
        job_id: String,
        error: String,
        result: Value,
        polling_time: f64,
    },
    #[serde(rename = "job_not_found")]
    NotFound {
        job_id: String,
        error: String,
        polling_time: f64,
    },
    Timeout {
        job_id: String,
        error: String,
        polling_time: f64,
    },
    Cancelled { job_id: String, polling_time: f64 },
    PollingError {
        job_id: String,
        error: String,
        polling_time: f64,
    },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
            JobOutcome::NotFound { .. } => JobStatus::JobNotFound,
            JobOutcome::Timeout { .. } => JobStatus::Timeout,
            JobOutcome::Cancelled { .. } => JobStatus::Cancelled,
            JobOutcome::PollingError { .. } => JobStatus::PollingError,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Completed { job_id, .. }
            | JobOutcome::Failed { job_id, .. }
            | JobOutcome::NotFound { job_id, .. }
            | JobOutcome::Timeout { job_id, .. }
            | JobOutcome::Cancelled { job_id, .. }
            | JobOutcome::PollingError { job_id, .. } => job_id,
        }
    }

    pub fn polling_time(&self) -> f64 {
        match self {
            JobOutcome::Completed { polling_time, .. }
            | JobOutcome::Failed { polling_time, .. }
            | JobOutcome::NotFound { polling_time, .. }
            | JobOutcome::Timeout { polling_time, .. }
            | JobOutcome::Cancelled { polling_time, .. }
            | JobOutcome::PollingError { polling_time, .. } => *polling_time,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Result of submit-then-wait: either the submission never produced a pollable job,
/// or the job reached a terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WaitOutcome {
    NotSubmitted(Submission),
    Finished(JobOutcome),
}

impl WaitOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            WaitOutcome::NotSubmitted(s) => s.status(),
            WaitOutcome::Finished(o) => o.status(),
        }
    }
}
