//! Async analysis job state machine
//!
//! A job moves QUEUED → PROCESSING → COMPLETED | FAILED. Terminal jobs carry
//! `finished_at`, which drives TTL eviction in the job store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AnalysisParameters, ParagraphAnalysis};

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, orchestration not yet started
    Queued,
    /// Orchestration running
    Processing,
    /// Finished with a result
    Completed,
    /// Orchestration failed as a whole
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Async analysis job (in-memory only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub status: JobStatus,

    /// Free-text progress descriptor
    pub progress: Option<String>,

    /// Set only when completed
    pub result: Option<ParagraphAnalysis>,

    /// Set only when failed
    pub error: Option<String>,

    pub paragraph: String,
    pub parameters: AnalysisParameters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a queued job
    pub fn new(paragraph: String, parameters: AnalysisParameters) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            status: JobStatus::Queued,
            progress: None,
            result: None,
            error: None,
            paragraph,
            parameters,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Transition to a new status, stamping terminal time
    pub fn transition_to(&mut self, new_status: JobStatus) {
        let now = Utc::now();
        self.status = new_status;
        self.updated_at = now;

        if new_status.is_terminal() {
            self.finished_at = Some(now);
        }
    }

    pub fn set_progress(&mut self, progress: impl Into<String>) {
        self.progress = Some(progress.into());
        self.updated_at = Utc::now();
    }

    /// Record the result and mark completed
    pub fn complete(&mut self, result: ParagraphAnalysis) {
        self.result = Some(result);
        self.error = None;
        self.transition_to(JobStatus::Completed);
    }

    /// Record the error and mark failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.result = None;
        self.error = Some(error.into());
        self.transition_to(JobStatus::Failed);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
