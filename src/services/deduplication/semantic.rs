//! Heuristic similarity deduplication checker.
//!
//! Scores the agent's recent records against new content with a positional
//! character-overlap heuristic. Cheap and best-effort; it catches near-verbatim
//! repeats, not paraphrases.

// Allow cast_precision_loss for character counts converted to f32 scores.
#![allow(clippy::cast_precision_loss)]

use crate::Result;
use crate::models::{MemoryQuery, MemoryRecord};
use crate::storage::RecordStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Checker for near-duplicate content.
///
/// # How it works
///
/// 1. Takes the agent's `candidate_limit` most recent records
/// 2. Scores each with [`char_overlap_similarity`]
/// 3. Returns the best candidate scoring at least the threshold
pub struct SemanticSimilarityChecker {
    store: Arc<dyn RecordStore>,
    candidate_limit: usize,
}

impl SemanticSimilarityChecker {
    /// Creates a new checker. A zero `candidate_limit` is raised to 1.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, candidate_limit: usize) -> Self {
        Self {
            store,
            candidate_limit: candidate_limit.max(1),
        }
    }

    /// Returns the best-scoring record at or above `threshold`, with its score.
    #[instrument(
        skip(self, content),
        fields(operation = "semantic_check", content_length = content.len(), threshold)
    )]
    pub fn check(
        &self,
        agent_id: &str,
        content: &str,
        threshold: f32,
    ) -> Result<Option<(MemoryRecord, f32)>> {
        let start = Instant::now();
        let mut candidates = self.store.query(&MemoryQuery::for_agent(agent_id))?;
        // Stable sort keeps store order among records with equal timestamps.
        candidates.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        candidates.truncate(self.candidate_limit);

        let mut best: Option<(MemoryRecord, f32)> = None;
        for candidate in candidates {
            let score = char_overlap_similarity(content, &candidate.content);
            if score < threshold {
                continue;
            }
            if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
                best = Some((candidate, score));
            }
        }

        metrics::histogram!(
            "deduplication_check_duration_ms",
            "checker" => "semantic",
            "found" => if best.is_some() { "true" } else { "false" }
        )
        .record(start.elapsed().as_millis() as f64);

        Ok(best)
    }
}

/// Fraction of positions holding the same character, over the longer text.
///
/// Returns 0.0 if either text is empty.
///
/// # Example
///
/// ```rust
/// use katra::services::deduplication::char_overlap_similarity;
///
/// assert!((char_overlap_similarity("abcd", "abcd") - 1.0).abs() < f32::EPSILON);
/// assert!((char_overlap_similarity("abcd", "abxx") - 0.5).abs() < f32::EPSILON);
/// assert_eq!(char_overlap_similarity("", "abcd"), 0.0);
/// ```
#[must_use]
pub fn char_overlap_similarity(a: &str, b: &str) -> f32 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }
    let matching = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    matching as f32 / len_a.max(len_b) as f32
}
