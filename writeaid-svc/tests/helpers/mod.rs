//! Shared test helpers

#![allow(dead_code)]

pub mod scripted_upstream;

use std::sync::Arc;
use std::time::Duration;
use writeaid_svc::services::{
    ParagraphOrchestrator, RemoteCall, SessionWorkflowEngine, UpstreamProfile, WorkflowTiming,
};

/// Millisecond timing so retry paths run quickly
pub fn fast_timing() -> WorkflowTiming {
    WorkflowTiming {
        poll_interval: Duration::from_millis(1),
        log_every_checks: 5,
        result_id_attempts: 5,
        result_id_retry: Duration::from_millis(1),
        result_fetch_attempts: 3,
        result_fetch_retry: Duration::from_millis(1),
    }
}

pub fn engine(remote: Arc<dyn RemoteCall>) -> Arc<SessionWorkflowEngine> {
    Arc::new(SessionWorkflowEngine::new(remote, UpstreamProfile::default(), fast_timing()))
}

pub fn orchestrator(remote: Arc<dyn RemoteCall>) -> ParagraphOrchestrator {
    ParagraphOrchestrator::new(engine(remote), 3, 5, "EB White".to_string())
}
