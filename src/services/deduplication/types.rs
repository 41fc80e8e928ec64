//! Deduplication result types.

use crate::models::RecordId;
use serde::{Deserialize, Serialize};

/// Result of a deduplication check.
///
/// # Example
///
/// ```rust
/// use katra::services::deduplication::{DuplicateCheckResult, DuplicateReason};
/// use katra::RecordId;
///
/// let result = DuplicateCheckResult::exact_match(
///     RecordId::new("ci_1700000000_ab12cd34"),
///     "Restarted the indexer".to_string(),
///     2,
/// );
/// assert!(result.has_exact_duplicate());
/// assert_eq!(result.reason, Some(DuplicateReason::ExactMatch));
/// assert_eq!(result.recommendation(), "Skip storing - exact duplicate exists");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCheckResult {
    /// Whether the content is a duplicate.
    pub is_duplicate: bool,

    /// Why the content was identified as a duplicate.
    pub reason: Option<DuplicateReason>,

    /// Similarity of the match (1.0 for exact matches).
    pub similarity_score: Option<f32>,

    /// The matched record.
    pub matched_record_id: Option<RecordId>,

    /// Preview of the matched record's content.
    pub match_preview: Option<String>,

    /// Duration of the check in milliseconds.
    pub check_duration_ms: u64,
}

impl DuplicateCheckResult {
    /// Creates a result indicating no duplicate was found.
    #[must_use]
    pub const fn not_duplicate(duration_ms: u64) -> Self {
        Self {
            is_duplicate: false,
            reason: None,
            similarity_score: None,
            matched_record_id: None,
            match_preview: None,
            check_duration_ms: duration_ms,
        }
    }

    /// Creates a result indicating an exact match was found.
    #[must_use]
    pub const fn exact_match(record_id: RecordId, preview: String, duration_ms: u64) -> Self {
        Self {
            is_duplicate: true,
            reason: Some(DuplicateReason::ExactMatch),
            similarity_score: Some(1.0),
            matched_record_id: Some(record_id),
            match_preview: Some(preview),
            check_duration_ms: duration_ms,
        }
    }

    /// Creates a result indicating a heuristic similarity match was found.
    #[must_use]
    pub const fn semantic_match(
        record_id: RecordId,
        preview: String,
        score: f32,
        duration_ms: u64,
    ) -> Self {
        Self {
            is_duplicate: true,
            reason: Some(DuplicateReason::SemanticSimilar),
            similarity_score: Some(score),
            matched_record_id: Some(record_id),
            match_preview: Some(preview),
            check_duration_ms: duration_ms,
        }
    }

    /// Returns true if an exact duplicate was found.
    #[must_use]
    pub fn has_exact_duplicate(&self) -> bool {
        self.reason == Some(DuplicateReason::ExactMatch)
    }

    /// Returns true if a similar (non-exact) duplicate was found.
    #[must_use]
    pub fn has_semantic_duplicate(&self) -> bool {
        self.reason == Some(DuplicateReason::SemanticSimilar)
    }

    /// Returns what the caller should do with the content.
    #[must_use]
    pub const fn recommendation(&self) -> &'static str {
        match self.reason {
            Some(DuplicateReason::ExactMatch) => "Skip storing - exact duplicate exists",
            Some(DuplicateReason::SemanticSimilar) => "Consider skipping - similar content exists",
            None => "Safe to store - no duplicates found",
        }
    }
}

impl Default for DuplicateCheckResult {
    fn default() -> Self {
        Self::not_duplicate(0)
    }
}

/// The reason content was identified as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Normalized content hash matches a recent record.
    ExactMatch,

    /// Character-overlap similarity meets the threshold.
    SemanticSimilar,
}

impl std::fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactMatch => write!(f, "exact_match"),
            Self::SemanticSimilar => write!(f, "semantic_similar"),
        }
    }
}
