//! writeaid-svc library interface
//!
//! Exposes the router and state builders for the binary and integration tests.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::{http::header, http::Method, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use writeaid_common::TomlConfig;

use crate::services::{
    HttpRemoteCall, JobStore, ParagraphOrchestrator, RemoteCall, SessionWorkflowEngine, UpstreamProfile,
    WorkflowTiming,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Async job facade (also owns the orchestrator)
    pub jobs: JobStore,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(jobs: JobStore) -> Self {
        Self {
            jobs,
            startup_time: Utc::now(),
        }
    }

    /// Wire the production stack from configuration
    pub fn from_config(config: &TomlConfig) -> writeaid_common::Result<Self> {
        let remote = HttpRemoteCall::new(&config.upstream)
            .map_err(|e| writeaid_common::Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_remote(config, Arc::new(remote)))
    }

    /// Wire the stack around any upstream implementation
    pub fn with_remote(config: &TomlConfig, remote: Arc<dyn RemoteCall>) -> Self {
        let orchestrator = build_orchestrator(config, remote);
        let jobs = JobStore::new(Arc::new(orchestrator), Duration::from_secs(config.jobs.ttl_secs));
        Self::new(jobs)
    }
}

/// Build the paragraph orchestrator from configuration
pub fn build_orchestrator(config: &TomlConfig, remote: Arc<dyn RemoteCall>) -> ParagraphOrchestrator {
    let engine = SessionWorkflowEngine::new(
        remote,
        UpstreamProfile::from(&config.upstream),
        WorkflowTiming::from(&config.workflow),
    );

    ParagraphOrchestrator::new(
        Arc::new(engine),
        config.orchestrator.concurrency,
        config.orchestrator.max_rounds,
        config.upstream.author.clone(),
    )
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(api::analysis_routes())
        .merge(api::health_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
