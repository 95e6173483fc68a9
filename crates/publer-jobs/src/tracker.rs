//! Single-job submission and polling.

use chrono::Utc;
use futures::FutureExt;
use publer_types::{Forwarder, Headers, JobOutcome, Submission, WaitOutcome};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default wall-clock limit for waiting on a job.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const BATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polling bounds. `timeout` is measured from the start of the poll loop, not per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl PollOptions {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Defaults used when polling a whole batch (longer interval, same timeout).
    pub fn batch_default() -> Self {
        Self::new(DEFAULT_JOB_TIMEOUT, BATCH_POLL_INTERVAL)
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// Submits work to the upstream API and waits for it to finish.
///
/// No operation here returns an error: every failure is reported through the `status` of the
/// returned record so tool handlers can always answer with structured JSON.
#[derive(Clone)]
pub struct JobTracker {
    forwarder: Arc<dyn Forwarder>,
}

impl JobTracker {
    pub fn new(forwarder: Arc<dyn Forwarder>) -> Self {
        Self { forwarder }
    }

    pub fn forwarder(&self) -> &Arc<dyn Forwarder> {
        &self.forwarder
    }

    /// POST `payload` to `endpoint` and normalize the reply into a [`Submission`].
    ///
    /// `timeout` is recorded on the submission for later waits; it is not enforced here.
    pub async fn submit_job(
        &self,
        endpoint: &str,
        headers: &Headers,
        payload: &Value,
        timeout: Duration,
    ) -> Submission {
        let call = AssertUnwindSafe(self.forwarder.post(endpoint, headers, Some(payload)));
        match call.catch_unwind().await {
            Ok(Ok(response)) => {
                let submission = classify_submission(endpoint, response, timeout);
                match &submission {
                    Submission::Submitted { job_id, .. } => {
                        tracing::info!(job_id = %job_id, endpoint, "job submitted");
                    }
                    Submission::Immediate { job_id, .. } => {
                        tracing::info!(job_id = %job_id, endpoint, "job completed synchronously");
                    }
                    _ => tracing::warn!(endpoint, "unrecognized submission response"),
                }
                submission
            }
            Ok(Err(e)) => {
                tracing::warn!(endpoint, error = %e, "job submission failed");
                Submission::ApiError {
                    error: format!("API error during job submission: {}", e),
                    endpoint: endpoint.to_string(),
                }
            }
            Err(panic) => {
                let msg = panic_message(&*panic);
                tracing::error!(endpoint, error = %msg, "job submission panicked");
                Submission::SubmissionError {
                    error: format!("Unexpected error during job submission: {}", msg),
                    endpoint: endpoint.to_string(),
                    response: None,
                }
            }
        }
    }

    /// Poll `job_status/{job_id}` until a terminal status or until `opts.timeout` elapses.
    pub async fn poll_job_completion(
        &self,
        job_id: &str,
        headers: &Headers,
        opts: PollOptions,
    ) -> JobOutcome {
        self.poll(job_id, headers, opts, None).await
    }

    /// Like [`poll_job_completion`](Self::poll_job_completion), but stops early with
    /// `cancelled` once `cancel` fires.
    pub async fn poll_job_cancellable(
        &self,
        job_id: &str,
        headers: &Headers,
        opts: PollOptions,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        self.poll(job_id, headers, opts, Some(cancel)).await
    }

    /// Submit, then wait inline. Synchronous upstream completions skip polling entirely.
    pub async fn submit_and_wait(
        &self,
        endpoint: &str,
        headers: &Headers,
        payload: &Value,
        opts: PollOptions,
    ) -> WaitOutcome {
        match self.submit_job(endpoint, headers, payload, opts.timeout).await {
            Submission::Immediate {
                job_id,
                immediate_response,
                ..
            } => WaitOutcome::Finished(JobOutcome::Completed {
                job_id,
                result: immediate_response,
                polling_time: 0.0,
                was_immediate: true,
            }),
            Submission::Submitted { job_id, .. } => {
                WaitOutcome::Finished(self.poll_job_completion(&job_id, headers, opts).await)
            }
            failed => WaitOutcome::NotSubmitted(failed),
        }
    }

    async fn poll(
        &self,
        job_id: &str,
        headers: &Headers,
        opts: PollOptions,
        cancel: Option<&CancellationToken>,
    ) -> JobOutcome {
        let start = Instant::now();
        let endpoint = format!("job_status/{}", job_id);

        while start.elapsed() < opts.timeout {
            let call =
                AssertUnwindSafe(self.forwarder.get(&endpoint, headers, None)).catch_unwind();
            let reply = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return cancelled(job_id, start),
                    r = call => r,
                },
                None => call.await,
            };

            match reply {
                Ok(Ok(body)) => match status_of(&body).as_deref() {
                    Some("completed") => {
                        tracing::info!(job_id, "job completed");
                        return JobOutcome::Completed {
                            job_id: job_id.to_string(),
                            result: body,
                            polling_time: elapsed_secs(start),
                            was_immediate: false,
                        };
                    }
                    Some("failed") => {
                        let reason = body
                            .get("error")
                            .and_then(Value::as_str)
                            .unwrap_or("Job failed without specific error message")
                            .to_string();
                        tracing::info!(job_id, error = %reason, "job failed");
                        return JobOutcome::Failed {
                            job_id: job_id.to_string(),
                            error: format!("Job {} failed: {}", job_id, reason),
                            result: body,
                            polling_time: elapsed_secs(start),
                        };
                    }
                    other => tracing::debug!(job_id, status = ?other, "job still running"),
                },
                Ok(Err(e)) if e.is_not_found() => {
                    tracing::info!(job_id, error = %e, "job not found");
                    return JobOutcome::NotFound {
                        job_id: job_id.to_string(),
                        error: format!("Job {} not found during polling", job_id),
                        polling_time: elapsed_secs(start),
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!(job_id, error = %e, "transient error while polling, continuing");
                }
                Err(panic) => {
                    let msg = panic_message(&*panic);
                    tracing::error!(job_id, error = %msg, "polling panicked");
                    return JobOutcome::PollingError {
                        job_id: job_id.to_string(),
                        error: format!("Error while polling job status: {}", msg),
                        polling_time: elapsed_secs(start),
                    };
                }
            }

            let pause = tokio::time::sleep(opts.poll_interval);
            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return cancelled(job_id, start),
                    _ = pause => {}
                },
                None => pause.await,
            }
        }

        tracing::warn!(job_id, timeout_secs = opts.timeout.as_secs(), "job polling timed out");
        JobOutcome::Timeout {
            job_id: job_id.to_string(),
            error: format!(
                "Job {} did not complete within {} seconds",
                job_id,
                opts.timeout.as_secs()
            ),
            polling_time: opts.timeout.as_secs_f64(),
        }
    }
}

fn classify_submission(endpoint: &str, response: Value, timeout: Duration) -> Submission {
    let Some(obj) = response.as_object() else {
        return Submission::SubmissionError {
            error: "Unexpected error during job submission: response is not a JSON object"
                .to_string(),
            endpoint: endpoint.to_string(),
            response: Some(response),
        };
    };

    if let Some(job_id) = obj.get("job_id").and_then(job_id_string) {
        return Submission::Submitted {
            job_id,
            submitted_at: Utc::now(),
            endpoint: endpoint.to_string(),
            timeout: timeout.as_secs(),
        };
    }

    let succeeded = obj.get("status").and_then(Value::as_str) == Some("success");
    if succeeded || obj.contains_key("posts") {
        let now = Utc::now();
        return Submission::Immediate {
            job_id: format!("sync_{}", now.timestamp()),
            submitted_at: now,
            endpoint: endpoint.to_string(),
            immediate_response: response,
        };
    }

    Submission::SubmissionError {
        error: "Invalid response format".to_string(),
        endpoint: endpoint.to_string(),
        response: Some(response),
    }
}

fn status_of(body: &Value) -> Option<String> {
    body.get("status").and_then(Value::as_str).map(String::from)
}

/// Upstream ids may be strings or numbers; empty strings count as absent.
fn job_id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cancelled(job_id: &str, start: Instant) -> JobOutcome {
    tracing::info!(job_id, "job polling cancelled");
    JobOutcome::Cancelled {
        job_id: job_id.to_string(),
        polling_time: elapsed_secs(start),
    }
}

fn elapsed_secs(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100.0).round() / 100.0
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
