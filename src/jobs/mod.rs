//! Background clustering jobs.
//!
//! Submissions go onto a bounded queue drained by a fixed number of worker
//! tasks. Job records live in a TTL cache and can be polled by id until
//! they expire.

mod queue;
mod store;

pub use queue::{JobQueue, JobRunner};
pub use store::JobStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clustering::ClusteringOutput;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job will not change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job as seen by pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub task_id: String,
    pub status: JobStatus,
    /// `"0%"` until the job completes, then `"100%"`.
    pub progress: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ClusteringOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn pending(task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: JobStatus::Pending,
            progress: "0%".to_string(),
            result: None,
            error: None,
            message: Some("Task is still processing.".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn started(mut self) -> Self {
        self.status = JobStatus::InProgress;
        self.updated_at = Utc::now();
        self
    }

    pub fn completed(mut self, output: ClusteringOutput) -> Self {
        self.status = JobStatus::Completed;
        self.progress = "100%".to_string();
        self.result = Some(output);
        self.message = None;
        self.updated_at = Utc::now();
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.message = None;
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lifecycle() {
        let record = JobRecord::pending("abc");
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress, "0%");
        assert!(record.message.is_some());

        let record = record.started();
        assert_eq!(record.status, JobStatus::InProgress);
        assert!(!record.status.is_terminal());

        let done = record.clone().completed(ClusteringOutput::default());
        assert_eq!(done.progress, "100%");
        assert!(done.result.is_some());
        assert!(done.message.is_none());

        let failed = record.failed("boom");
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.progress, "0%");
    }

    #[test]
    fn test_record_serialization_skips_empty_fields() {
        let json = serde_json::to_value(JobRecord::pending("abc")).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["task_id"], "abc");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(JobRecord::pending("abc").started()).unwrap();
        assert_eq!(json["status"], "in_progress");
    }
}
