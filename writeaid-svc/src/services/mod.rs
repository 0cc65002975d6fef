//! Analysis services: upstream adapter, per-sentence workflow, paragraph
//! orchestration, aggregation and the async job store

pub mod job_store;
pub mod paragraph_orchestrator;
pub mod remote_call;
pub mod result_aggregator;
pub mod sentence_splitter;
pub mod session_workflow;

pub use job_store::JobStore;
pub use paragraph_orchestrator::{OrchestrationError, ParagraphOrchestrator, ProgressSink};
pub use remote_call::{HttpRemoteCall, RemoteCall, RemoteCallError};
pub use sentence_splitter::split_sentences;
pub use session_workflow::{SessionWorkflowEngine, UpstreamProfile, WorkflowError, WorkflowTiming};
