//! Job tracker: submit work upstream, poll it to a terminal state, and track batches.

mod batch;
mod report;
mod tracker;

pub use batch::{BatchCounts, BatchSummary, BatchTiming, JobBatch};
pub use publer_types::{JobOutcome, JobStatus, Submission, WaitOutcome};
pub use report::{JobReport, ReportSummary, ReportTiming};
pub use tokio_util::sync::CancellationToken;
pub use tracker::{JobTracker, PollOptions, DEFAULT_JOB_TIMEOUT};
