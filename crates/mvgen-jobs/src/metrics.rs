//! Job lifecycle metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Submissions by outcome.
    pub const SUBMISSIONS_TOTAL: &str = "mvgen_job_submissions_total";

    /// Jobs reaching a terminal state, by remote state.
    pub const FINISHED_TOTAL: &str = "mvgen_jobs_finished_total";

    /// Status polls by result.
    pub const POLLS_TOTAL: &str = "mvgen_job_polls_total";

    /// Output fetches by result.
    pub const DOWNLOADS_TOTAL: &str = "mvgen_job_downloads_total";
}

pub fn record_submission(outcome: &str) {
    counter!(names::SUBMISSIONS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_finished(remote_state: &str) {
    counter!(names::FINISHED_TOTAL, "state" => remote_state.to_string()).increment(1);
}

pub fn record_poll(result: &str) {
    counter!(names::POLLS_TOTAL, "result" => result.to_string()).increment(1);
}

pub fn record_download(result: &str) {
    counter!(names::DOWNLOADS_TOTAL, "result" => result.to_string()).increment(1);
}
