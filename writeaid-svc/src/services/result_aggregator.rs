//! Paragraph-level aggregation of sentence workflow results

use std::ops::Range;
use uuid::Uuid;

use crate::models::{AnalysisParameters, ParagraphAnalysis, RoundSummary, SentenceWorkflowResult};

/// One completed pass: its summary plus results ordered by sentence index
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub summary: RoundSummary,
    pub results: Vec<SentenceWorkflowResult>,
}

/// Success percentage rounded to one decimal place (0 when `total` is 0)
pub fn success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = successful as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// Write `sentences` into `input_paragraph` at `spans`, keeping the text between them
pub fn splice_sentences<S: AsRef<str>>(
    input_paragraph: &str,
    spans: &[Range<usize>],
    sentences: &[S],
) -> String {
    let mut paragraph = String::with_capacity(input_paragraph.len());
    let mut cursor = 0;

    for (span, sentence) in spans.iter().zip(sentences) {
        paragraph.push_str(&input_paragraph[cursor..span.start]);
        paragraph.push_str(sentence.as_ref());
        cursor = span.end;
    }
    paragraph.push_str(&input_paragraph[cursor..]);

    paragraph
}

/// Reconstruct a paragraph from one pass
///
/// Each successful improvement that differs from its sentence replaces that
/// sentence in place, so sentence order and the surrounding layout survive.
/// Without any such change the input paragraph is returned verbatim.
pub fn reconstruct_paragraph(
    input_paragraph: &str,
    spans: &[Range<usize>],
    results: &[SentenceWorkflowResult],
) -> String {
    let mut current: Vec<&str> = spans.iter().map(|span| &input_paragraph[span.clone()]).collect();
    let mut changed = false;

    for result in results {
        if let (Some(improved), Some(slot)) =
            (result.improvement(), current.get_mut(result.sentence_index))
        {
            if improved != *slot {
                *slot = improved;
                changed = true;
            }
        }
    }

    if changed {
        splice_sentences(input_paragraph, spans, &current)
    } else {
        input_paragraph.to_string()
    }
}

/// Session URLs of successful units, in round then index order
pub fn collect_session_urls<'a>(
    results: impl IntoIterator<Item = &'a SentenceWorkflowResult>,
) -> Vec<String> {
    results
        .into_iter()
        .filter(|result| result.success)
        .filter_map(|result| result.session_url.clone())
        .collect()
}

/// Build the paragraph report from all executed rounds
pub fn aggregate(
    request_id: Uuid,
    original_paragraph: &str,
    parameters: &AnalysisParameters,
    rounds: Vec<RoundRecord>,
) -> ParagraphAnalysis {
    let session_urls = collect_session_urls(rounds.iter().flat_map(|round| round.results.iter()));

    let final_paragraph = rounds
        .last()
        .map(|round| round.summary.output_paragraph.clone())
        .unwrap_or_else(|| original_paragraph.to_string());

    let summaries: Vec<RoundSummary> = rounds.iter().map(|round| round.summary.clone()).collect();
    let sentence_results = rounds.into_iter().last().map(|round| round.results).unwrap_or_default();

    let total_sentences = sentence_results.len();
    let successful_analyses = sentence_results.iter().filter(|result| result.success).count();

    ParagraphAnalysis {
        request_id,
        original_paragraph: original_paragraph.to_string(),
        paragraph_updated: final_paragraph != original_paragraph,
        final_paragraph,
        sentence_results,
        total_sentences,
        successful_analyses,
        failed_analyses: total_sentences - successful_analyses,
        success_rate: success_rate(successful_analyses, total_sentences),
        session_urls,
        processing_direction: parameters.processing_direction,
        reprocessing_rounds: parameters.reprocessing_rounds,
        rounds: summaries,
    }
}
