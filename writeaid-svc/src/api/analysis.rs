//! Paragraph analysis API handlers
//!
//! POST /analyze-async, GET /job/:job_id, POST /analyze, POST /split-sentences

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{AnalysisParameters, JobStatus, ParagraphAnalysis},
    services::split_sentences,
    AppState,
};

/// POST /analyze and /analyze-async request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Missing is treated as empty and rejected with 400
    #[serde(default)]
    pub paragraph: String,
    #[serde(flatten)]
    pub parameters: AnalysisParameters,
}

/// POST /analyze-async response
#[derive(Debug, Serialize)]
pub struct AnalyzeAsyncResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// GET /job/:job_id response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ParagraphAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /split-sentences request
#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    #[serde(default)]
    pub paragraph: String,
}

/// POST /split-sentences response
#[derive(Debug, Serialize)]
pub struct SplitResponse {
    pub paragraph: String,
    pub sentences: Vec<String>,
    pub sentence_count: usize,
}

/// POST /analyze-async
///
/// Queue a paragraph analysis. Returns 202 Accepted with the job id.
pub async fn analyze_async(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<(StatusCode, Json<AnalyzeAsyncResponse>)> {
    let job_id = state.jobs.submit(request.paragraph, request.parameters).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeAsyncResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// GET /job/:job_id
///
/// Poll a job. Unknown and malformed ids are both 404.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::NotFound(format!("Job not found: {}", job_id)))?;

    let job = state.jobs.get_status(job_id).await?;
    tracing::debug!(job_id = %job_id, status = ?job.status, "Status query");

    Ok(Json(JobStatusResponse {
        job_id: job.job_id,
        status: job.status,
        progress: job.progress,
        result: job.result,
        error: job.error,
        created_at: job.created_at,
        updated_at: job.updated_at,
    }))
}

/// POST /analyze
///
/// Run the analysis inline and return the paragraph report.
pub async fn analyze_sync(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<ParagraphAnalysis>> {
    let analysis = state
        .jobs
        .orchestrator()
        .analyze(&request.paragraph, &request.parameters, None)
        .await?;
    Ok(Json(analysis))
}

/// POST /split-sentences
pub async fn split(Json(request): Json<SplitRequest>) -> ApiResult<Json<SplitResponse>> {
    if request.paragraph.trim().is_empty() {
        return Err(ApiError::BadRequest("Paragraph is required".to_string()));
    }

    let sentences = split_sentences(&request.paragraph);
    Ok(Json(SplitResponse {
        sentence_count: sentences.len(),
        paragraph: request.paragraph,
        sentences,
    }))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-async", post(analyze_async))
        .route("/job/:job_id", get(get_job))
        .route("/analyze", post(analyze_sync))
        .route("/split-sentences", post(split))
}
