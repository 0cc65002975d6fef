//! In-memory job store and async facade
//!
//! `submit` records a queued job and spawns the paragraph orchestration on
//! the runtime; callers poll `get_status` until the job is terminal. Only a
//! job's own task writes its progress and outcome. The sweeper removes
//! terminal jobs once their TTL has elapsed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use writeaid_common::{Error, Result};

use crate::models::{AnalysisParameters, Job, JobStatus};
use crate::services::paragraph_orchestrator::{OrchestrationError, ParagraphOrchestrator, ProgressSink};

type JobTable = Arc<RwLock<HashMap<Uuid, Job>>>;

/// Shared job table plus the orchestrator that fills it
#[derive(Clone)]
pub struct JobStore {
    jobs: JobTable,
    orchestrator: Arc<ParagraphOrchestrator>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(orchestrator: Arc<ParagraphOrchestrator>, ttl: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            orchestrator,
            ttl,
        }
    }

    pub fn orchestrator(&self) -> &Arc<ParagraphOrchestrator> {
        &self.orchestrator
    }

    /// Create a queued job and start its orchestration in the background
    ///
    /// Requests the orchestrator would reject are refused here, before any
    /// job exists.
    pub async fn submit(
        &self,
        paragraph: String,
        parameters: AnalysisParameters,
    ) -> std::result::Result<Uuid, OrchestrationError> {
        self.orchestrator.validate(&paragraph, &parameters)?;

        let job = Job::new(paragraph.clone(), parameters.clone());
        let job_id = job.job_id;
        self.jobs.write().await.insert(job_id, job);

        info!(job_id = %job_id, "Analysis job queued");

        let store = self.clone();
        let run = tokio::spawn(async move {
            store.run_job(job_id, paragraph, parameters).await;
        });

        // a panicking run must still leave the job terminal
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = run.await {
                error!(job_id = %job_id, error = %e, "Analysis task aborted");
                store
                    .update(job_id, |job| job.fail(format!("Analysis task aborted: {}", e)))
                    .await;
            }
        });

        Ok(job_id)
    }

    async fn run_job(&self, job_id: Uuid, paragraph: String, parameters: AnalysisParameters) {
        self.update(job_id, |job| job.transition_to(JobStatus::Processing)).await;
        debug!(job_id = %job_id, "Analysis job processing");

        let sink = JobProgress {
            jobs: Arc::clone(&self.jobs),
            job_id,
        };

        match self.orchestrator.analyze(&paragraph, &parameters, Some(&sink as &dyn ProgressSink)).await {
            Ok(analysis) => {
                info!(
                    job_id = %job_id,
                    successful = analysis.successful_analyses,
                    total = analysis.total_sentences,
                    "Analysis job completed"
                );
                self.update(job_id, |job| job.complete(analysis)).await;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Analysis job failed");
                self.update(job_id, |job| job.fail(e.to_string())).await;
            }
        }
    }

    async fn update(&self, job_id: Uuid, apply: impl FnOnce(&mut Job)) {
        match self.jobs.write().await.get_mut(&job_id) {
            Some(job) => apply(job),
            None => warn!(job_id = %job_id, "Job vanished before update"),
        }
    }

    /// Snapshot of a job
    pub async fn get_status(&self, job_id: Uuid) -> Result<Job> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Job not found: {}", job_id)))
    }

    /// Jobs not yet in a terminal state
    pub async fn active_jobs(&self) -> usize {
        self.jobs.read().await.values().filter(|job| !job.is_terminal()).count()
    }

    /// Remove terminal jobs whose TTL has elapsed at `now`; returns the count removed
    pub async fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();

        jobs.retain(|_, job| !is_expired(job, now, ttl));

        let evicted = before - jobs.len();
        if evicted > 0 {
            info!(evicted, remaining = jobs.len(), "Evicted expired jobs");
        }
        evicted
    }

    /// Periodically evict expired jobs until `shutdown` is cancelled
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Job sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.evict_expired_at(Utc::now()).await;
                    }
                }
            }
        })
    }
}

fn is_expired(job: &Job, now: DateTime<Utc>, ttl: Duration) -> bool {
    match (job.is_terminal(), job.finished_at) {
        (true, Some(finished_at)) => (now - finished_at)
            .to_std()
            .map(|age| age >= ttl)
            .unwrap_or(false),
        _ => false,
    }
}

/// Writes orchestrator progress into the owning job
struct JobProgress {
    jobs: JobTable,
    job_id: Uuid,
}

#[async_trait]
impl ProgressSink for JobProgress {
    async fn report(&self, progress: String) {
        debug!(job_id = %self.job_id, progress = %progress, "Job progress");
        if let Some(job) = self.jobs.write().await.get_mut(&self.job_id) {
            job.set_progress(progress);
        }
    }
}
