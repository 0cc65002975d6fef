//! Paragraph orchestrator
//!
//! Fans the session workflow out over every sentence of a paragraph and runs
//! `reprocessing_rounds + 1` passes, each taking the previous pass's
//! reconstructed paragraph as input.
//!
//! Two pass modes:
//! - context carrying: a strict single-lane chain in direction order; each
//!   changed sentence is written back before its successor starts
//! - context free: bounded concurrency through `buffer_unordered`
//!
//! Either way results are re-sorted by sentence index and a failing sentence
//! never affects its siblings.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AnalysisParameters, ParagraphAnalysis, RoundSummary, SentenceUnit, SentenceWorkflowResult};
use crate::services::result_aggregator::{self, RoundRecord};
use crate::services::sentence_splitter::sentence_spans;
use crate::services::session_workflow::SessionWorkflowEngine;

/// Whole-run failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("Paragraph is empty")]
    EmptyParagraph,

    #[error("No sentences found in paragraph (round {round})")]
    NoSentences { round: u32 },

    #[error("reprocessing_rounds {requested} exceeds maximum of {max}")]
    TooManyRounds { requested: u32, max: u32 },
}

/// Receiver for human-readable progress descriptors
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: String);
}

/// Paragraph-level fan-out over the session workflow engine
pub struct ParagraphOrchestrator {
    engine: Arc<SessionWorkflowEngine>,
    concurrency: usize,
    max_rounds: u32,
    author: String,
}

impl ParagraphOrchestrator {
    pub fn new(engine: Arc<SessionWorkflowEngine>, concurrency: usize, max_rounds: u32, author: String) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
            max_rounds,
            author,
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Reject requests that can never produce a run
    pub fn validate(&self, paragraph: &str, parameters: &AnalysisParameters) -> Result<(), OrchestrationError> {
        if paragraph.trim().is_empty() {
            return Err(OrchestrationError::EmptyParagraph);
        }
        if parameters.reprocessing_rounds > self.max_rounds {
            return Err(OrchestrationError::TooManyRounds {
                requested: parameters.reprocessing_rounds,
                max: self.max_rounds,
            });
        }
        Ok(())
    }

    /// Analyze a paragraph across all configured rounds
    pub async fn analyze(
        &self,
        paragraph: &str,
        parameters: &AnalysisParameters,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<ParagraphAnalysis, OrchestrationError> {
        self.validate(paragraph, parameters)?;

        let request_id = Uuid::new_v4();
        let total_rounds = parameters.reprocessing_rounds + 1;

        info!(
            request_id = %request_id,
            direction = ?parameters.processing_direction,
            rounds = total_rounds,
            carry_context = parameters.carry_context,
            "Paragraph analysis started"
        );

        let mut rounds: Vec<RoundRecord> = Vec::with_capacity(total_rounds as usize);
        let mut input = paragraph.to_string();

        for round in 0..total_rounds {
            let record = self.run_round(round, total_rounds, &input, parameters, progress).await?;
            info!(
                request_id = %request_id,
                round,
                total = record.summary.total_sentences,
                successful = record.summary.successful_analyses,
                "Round complete"
            );
            input = record.summary.output_paragraph.clone();
            rounds.push(record);
        }

        let analysis = result_aggregator::aggregate(request_id, paragraph, parameters, rounds);

        info!(
            request_id = %request_id,
            successful = analysis.successful_analyses,
            failed = analysis.failed_analyses,
            paragraph_updated = analysis.paragraph_updated,
            "Paragraph analysis finished"
        );

        Ok(analysis)
    }

    async fn run_round(
        &self,
        round: u32,
        total_rounds: u32,
        input_paragraph: &str,
        parameters: &AnalysisParameters,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<RoundRecord, OrchestrationError> {
        let spans = sentence_spans(input_paragraph);
        if spans.is_empty() {
            return Err(OrchestrationError::NoSentences { round });
        }

        let sentences: Vec<String> = spans
            .iter()
            .map(|span| input_paragraph[span.clone()].to_string())
            .collect();

        let tracker = RoundProgress {
            sink: progress,
            round,
            total_rounds,
            sentence_count: sentences.len(),
        };
        tracker.started().await;

        let order = parameters.processing_direction.order(sentences.len());
        let mut results = if parameters.carry_context {
            self.run_chained(input_paragraph, &spans, &sentences, &order, &tracker).await
        } else {
            self.run_concurrent(input_paragraph, &sentences, &order, &tracker).await
        };
        results.sort_by_key(|result| result.sentence_index);

        let output_paragraph = result_aggregator::reconstruct_paragraph(input_paragraph, &spans, &results);

        Ok(RoundRecord {
            summary: RoundSummary {
                round,
                input_paragraph: input_paragraph.to_string(),
                output_paragraph,
                total_sentences: results.len(),
                successful_analyses: results.iter().filter(|result| result.success).count(),
            },
            results,
        })
    }

    /// Sequential pass; each sentence sees the paragraph with earlier changes applied
    async fn run_chained(
        &self,
        input_paragraph: &str,
        spans: &[Range<usize>],
        sentences: &[String],
        order: &[usize],
        tracker: &RoundProgress<'_>,
    ) -> Vec<SentenceWorkflowResult> {
        let mut current: Vec<String> = sentences.to_vec();
        let mut updated = false;
        let mut previous: Option<usize> = None;
        let mut results = Vec::with_capacity(sentences.len());

        for &index in order {
            let paragraph_context = if updated {
                result_aggregator::splice_sentences(input_paragraph, spans, &current)
            } else {
                input_paragraph.to_string()
            };

            let unit = SentenceUnit {
                index,
                text: current[index].clone(),
                preceding_context: previous.map(|prev| current[prev].clone()),
                paragraph_context,
                author: self.author.clone(),
            };

            let result = self.engine.run(&unit).await;
            // an echoed sentence is not a change
            let changed = result.improvement().filter(|improved| *improved != current[index]);
            if let Some(improved) = changed {
                debug!(sentence_index = index, improved = %improved, "Carrying improved sentence forward");
                current[index] = improved.to_string();
                updated = true;
            }

            results.push(result);
            tracker.sentence_done(results.len()).await;
            previous = Some(index);
        }

        results
    }

    /// Bounded-concurrency pass; completion order is arbitrary
    async fn run_concurrent(
        &self,
        input_paragraph: &str,
        sentences: &[String],
        order: &[usize],
        tracker: &RoundProgress<'_>,
    ) -> Vec<SentenceWorkflowResult> {
        let units: Vec<SentenceUnit> = order
            .iter()
            .map(|&index| SentenceUnit {
                index,
                text: sentences[index].clone(),
                preceding_context: None,
                paragraph_context: input_paragraph.to_string(),
                author: self.author.clone(),
            })
            .collect();

        let engine = Arc::clone(&self.engine);
        let mut pending = stream::iter(units)
            .map(move |unit| {
                let engine = Arc::clone(&engine);
                async move { engine.run(&unit).await }
            })
            .buffer_unordered(self.concurrency);

        let mut results = Vec::with_capacity(sentences.len());
        while let Some(result) = pending.next().await {
            results.push(result);
            tracker.sentence_done(results.len()).await;
        }
        results
    }
}

/// Formats and forwards progress for one round
struct RoundProgress<'a> {
    sink: Option<&'a dyn ProgressSink>,
    round: u32,
    total_rounds: u32,
    sentence_count: usize,
}

impl RoundProgress<'_> {
    async fn started(&self) {
        if let Some(sink) = self.sink {
            sink.report(format!(
                "Round {}/{}: analysing {} sentences",
                self.round + 1,
                self.total_rounds,
                self.sentence_count
            ))
            .await;
        }
    }

    async fn sentence_done(&self, done: usize) {
        if let Some(sink) = self.sink {
            sink.report(format!(
                "Round {}/{}: sentence {}/{} complete",
                self.round + 1,
                self.total_rounds,
                done,
                self.sentence_count
            ))
            .await;
        }
    }
}
