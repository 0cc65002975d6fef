//! Data models for writeaid-svc

pub mod analysis;
pub mod job;
pub mod parameters;

pub use analysis::{ParagraphAnalysis, RoundSummary, SentenceUnit, SentenceWorkflowResult};
pub use job::{Job, JobStatus};
pub use parameters::{AnalysisParameters, ProcessingDirection};
