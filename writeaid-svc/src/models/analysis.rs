//! Sentence- and paragraph-level analysis records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::ProcessingDirection;

/// One sentence's unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceUnit {
    /// Position in the split paragraph (0-based, independent of direction)
    pub index: usize,
    /// Sentence text submitted for analysis
    pub text: String,
    /// Predecessor's current text, set only when context is carried forward
    pub preceding_context: Option<String>,
    /// Paragraph the sentence is situated in
    pub paragraph_context: String,
    pub author: String,
}

/// Outcome of one sentence's session workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceWorkflowResult {
    pub sentence_index: usize,
    pub success: bool,
    /// Sentence as submitted
    pub sentence: String,
    /// Rewritten sentence, when the analysis carried one
    pub improved_sentence: Option<String>,
    pub session_id: Option<String>,
    pub session_url: Option<String>,
    /// Raw upstream analysis payload
    pub analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl SentenceWorkflowResult {
    /// Improved text of a successful unit
    pub fn improvement(&self) -> Option<&str> {
        if self.success {
            self.improved_sentence.as_deref()
        } else {
            None
        }
    }
}

/// Summary of one full pass over a paragraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// 0 for the initial pass
    pub round: u32,
    pub input_paragraph: String,
    pub output_paragraph: String,
    pub total_sentences: usize,
    pub successful_analyses: usize,
}

/// Paragraph-level analysis report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphAnalysis {
    pub request_id: Uuid,
    pub original_paragraph: String,
    /// Reconstructed paragraph after the last round
    pub final_paragraph: String,
    /// Last round's results, ordered by sentence index
    pub sentence_results: Vec<SentenceWorkflowResult>,
    pub total_sentences: usize,
    pub successful_analyses: usize,
    pub failed_analyses: usize,
    /// Percentage, one decimal place
    pub success_rate: f64,
    /// Final paragraph differs from the original
    pub paragraph_updated: bool,
    /// Session URLs of successful units across all rounds
    pub session_urls: Vec<String>,
    pub processing_direction: ProcessingDirection,
    pub reprocessing_rounds: u32,
    pub rounds: Vec<RoundSummary>,
}
