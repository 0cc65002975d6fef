//! Paragraph analysis parameters

use serde::{Deserialize, Serialize};

/// Order in which sentences are submitted to the upstream service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingDirection {
    /// Sentence 0 first
    #[default]
    FirstToLast,
    /// Last sentence first
    LastToFirst,
}

impl ProcessingDirection {
    /// Sentence indices in submission order
    pub fn order(self, count: usize) -> Vec<usize> {
        match self {
            ProcessingDirection::FirstToLast => (0..count).collect(),
            ProcessingDirection::LastToFirst => (0..count).rev().collect(),
        }
    }
}

/// Per-request analysis parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParameters {
    /// Submission order (default: first-to-last)
    #[serde(default)]
    pub processing_direction: ProcessingDirection,

    /// Extra full passes over the improved paragraph (default: 0)
    #[serde(default)]
    pub reprocessing_rounds: u32,

    /// Feed each improved sentence into its successor's context (default: true)
    #[serde(default = "default_carry_context")]
    pub carry_context: bool,
}

fn default_carry_context() -> bool {
    true
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            processing_direction: ProcessingDirection::default(),
            reprocessing_rounds: 0,
            carry_context: default_carry_context(),
        }
    }
}
