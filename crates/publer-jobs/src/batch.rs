//! Batches: a fixed set of job ids polled concurrently and summarized together.

use crate::tracker::{panic_message, JobTracker, PollOptions};
use chrono::{DateTime, Utc};
use publer_types::{Headers, JobOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;
use uuid::Uuid;

/// A named, immutable set of job ids created together.
///
/// `completed_jobs` only ever holds ids from `job_ids`; each entry is written once, after that
/// job's own poll resolves.
#[derive(Debug, Clone)]
pub struct JobBatch {
    batch_id: String,
    job_ids: Vec<String>,
    created_at: DateTime<Utc>,
    completed_jobs: BTreeMap<String, JobOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchCounts {
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    /// Percentage of jobs that reached `completed`, rounded; 0 for an empty batch.
    pub success_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchTiming {
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Wall-clock seconds from poll start to the last job's resolution.
    pub total_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub status: &'static str,
    pub summary: BatchCounts,
    pub job_results: BTreeMap<String, JobOutcome>,
    pub timing: BatchTiming,
}

impl JobBatch {
    pub fn new(batch_id: impl Into<String>, job_ids: Vec<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            job_ids,
            created_at: Utc::now(),
            completed_jobs: BTreeMap::new(),
        }
    }

    /// Batch with a generated (uuid v4) id.
    pub fn with_generated_id(job_ids: Vec<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), job_ids)
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn job_ids(&self) -> &[String] {
        &self.job_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_jobs(&self) -> &BTreeMap<String, JobOutcome> {
        &self.completed_jobs
    }

    /// True once every job id has a resolved record.
    pub fn is_terminal(&self) -> bool {
        self.job_ids
            .iter()
            .all(|id| self.completed_jobs.contains_key(id))
    }

    /// Poll every job concurrently and wait for all of them.
    ///
    /// Each job runs in its own task; one job failing (or its task panicking) is recorded in
    /// that job's slot and never cancels the others.
    pub async fn poll_all_jobs(
        &mut self,
        tracker: &JobTracker,
        headers: &Headers,
        opts: PollOptions,
    ) -> BatchSummary {
        let start = Instant::now();
        tracing::info!(
            batch_id = %self.batch_id,
            jobs = self.job_ids.len(),
            "polling batch"
        );

        let handles: Vec<_> = self
            .job_ids
            .iter()
            .map(|job_id| {
                let tracker = tracker.clone();
                let headers = headers.clone();
                let job_id = job_id.clone();
                tokio::spawn(
                    async move { tracker.poll_job_completion(&job_id, &headers, opts).await },
                )
            })
            .collect();
        let joined = futures::future::join_all(handles).await;

        let mut completed = 0;
        for (job_id, joined) in self.job_ids.iter().zip(joined) {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = if e.is_panic() {
                        panic_message(&*e.into_panic())
                    } else {
                        e.to_string()
                    };
                    tracing::error!(job_id = %job_id, error = %error, "batch poll task failed");
                    JobOutcome::PollingError {
                        job_id: job_id.clone(),
                        error,
                        polling_time: 0.0,
                    }
                }
            };
            if outcome.is_completed() {
                completed += 1;
            }
            self.completed_jobs.insert(job_id.clone(), outcome);
        }

        let total = self.job_ids.len();
        let success_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        let total_time = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        tracing::info!(
            batch_id = %self.batch_id,
            completed,
            total,
            total_time,
            "batch polling finished"
        );

        BatchSummary {
            batch_id: self.batch_id.clone(),
            status: "batch_completed",
            summary: BatchCounts {
                total_jobs: total,
                completed_jobs: completed,
                failed_jobs: total - completed,
                success_rate,
            },
            job_results: self.completed_jobs.clone(),
            timing: BatchTiming {
                created_at: self.created_at,
                completed_at: Utc::now(),
                total_time,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use publer_client::{MockForwarder, MockReply};
    use publer_types::{Forwarder, JobStatus};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn tracker(mock: MockForwarder) -> JobTracker {
        let forwarder: Arc<dyn Forwarder> = Arc::new(mock);
        JobTracker::new(forwarder)
    }

    #[tokio::test(start_paused = true)]
    async fn one_job_failing_does_not_block_the_other() {
        let t = tracker(
            MockForwarder::new()
                .on_get("job_status/A", [MockReply::Panic("connection pool poisoned".to_string())])
                .on_get(
                    "job_status/B",
                    [
                        MockReply::Json(json!({ "status": "in_progress" })),
                        MockReply::Json(json!({ "status": "completed", "results": [] })),
                    ],
                ),
        );
        let mut batch = JobBatch::new("b1", vec!["A".to_string(), "B".to_string()]);
        let opts = PollOptions::new(Duration::from_secs(60), Duration::from_secs(5));
        let summary = batch.poll_all_jobs(&t, &Headers::new(), opts).await;

        assert!(batch.is_terminal());
        assert_eq!(summary.job_results.len(), 2);
        assert_eq!(summary.job_results["A"].status(), JobStatus::PollingError);
        assert_eq!(summary.job_results["B"].status(), JobStatus::Completed);
        assert_eq!(summary.summary.completed_jobs, 1);
        assert_eq!(summary.summary.failed_jobs, 1);
        assert_eq!(summary.summary.success_rate, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_are_polled_concurrently() {
        let t = tracker(
            MockForwarder::new()
                .on_get(
                    "job_status/A",
                    [
                        MockReply::Json(json!({ "status": "in_progress" })),
                        MockReply::Json(json!({ "status": "in_progress" })),
                        MockReply::Json(json!({ "status": "completed" })),
                    ],
                )
                .on_get(
                    "job_status/B",
                    [
                        MockReply::Json(json!({ "status": "in_progress" })),
                        MockReply::Json(json!({ "status": "in_progress" })),
                        MockReply::Json(json!({ "status": "completed" })),
                    ],
                )
                .on_get(
                    "job_status/C",
                    [MockReply::Error(publer_types::ForwardError::Api {
                        status: 404,
                        message: "not found".to_string(),
                    })],
                ),
        );
        let mut batch = JobBatch::with_generated_id(vec!["A".into(), "B".into(), "C".into()]);
        let summary = batch
            .poll_all_jobs(&t, &Headers::new(), PollOptions::batch_default())
            .await;

        // Two polls of 5s each per job, run side by side rather than back to back.
        assert_eq!(summary.timing.total_time, 10.0);
        assert_eq!(summary.job_results["C"].status(), JobStatus::JobNotFound);
        assert_eq!(summary.summary.success_rate, 67);
        assert!(!summary.batch_id.is_empty());
        assert_eq!(summary.status, "batch_completed");
    }

    #[tokio::test]
    async fn empty_batch_has_zero_success_rate() {
        let t = tracker(MockForwarder::new());
        let mut batch = JobBatch::new("empty", Vec::new());
        let summary = batch
            .poll_all_jobs(&t, &Headers::new(), PollOptions::default())
            .await;
        assert_eq!(summary.summary.total_jobs, 0);
        assert_eq!(summary.summary.success_rate, 0);
        assert!(batch.is_terminal());
    }
}
