//! Deduplication service orchestrator.
//!
//! Runs the exact-match check first and the similarity check only when the
//! caller asks for it (threshold above zero). Returns on the first match.

use crate::models::preview;
use crate::storage::RecordStore;
use crate::{Error, Result, current_timestamp};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::exact_match::ExactMatchChecker;
use super::semantic::SemanticSimilarityChecker;
use super::types::DuplicateCheckResult;

/// Service for duplicate checks before a record is admitted.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use katra::services::deduplication::{DeduplicationConfig, DeduplicationService};
/// use katra::storage::{InMemoryRecordStore, RecordStore};
/// use katra::MemoryType;
///
/// let store = Arc::new(InMemoryRecordStore::new());
/// let record = store.create("ci-alpha", MemoryType::Experience, "Indexer crashed", 0.5);
/// store.store(&record)?;
///
/// let service = DeduplicationService::new(store, DeduplicationConfig::default());
/// let result = service.check_duplicate("ci-alpha", "Indexer crashed", 0.0)?;
/// assert!(result.has_exact_duplicate());
/// # Ok::<(), katra::Error>(())
/// ```
pub struct DeduplicationService {
    config: DeduplicationConfig,
    exact_match: ExactMatchChecker,
    semantic: SemanticSimilarityChecker,
}

impl DeduplicationService {
    /// Creates a new deduplication service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, config: DeduplicationConfig) -> Self {
        let exact_match = ExactMatchChecker::new(Arc::clone(&store), config.recent_window);
        let semantic = SemanticSimilarityChecker::new(store, config.candidate_limit);
        Self {
            config,
            exact_match,
            semantic,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    /// Checks content using the configured default threshold.
    pub fn check_default(&self, agent_id: &str, content: &str) -> Result<DuplicateCheckResult> {
        self.check_duplicate(agent_id, content, self.config.default_threshold)
    }

    /// Checks whether `content` duplicates one of the agent's records.
    ///
    /// `threshold` is clamped to 0.0..=1.0; 0.0 disables the similarity pass.
    pub fn check_duplicate(
        &self,
        agent_id: &str,
        content: &str,
        threshold: f32,
    ) -> Result<DuplicateCheckResult> {
        self.check_duplicate_at(agent_id, content, threshold, current_timestamp())
    }

    /// Same as [`check_duplicate`](Self::check_duplicate) with an explicit
    /// current time for the recency window.
    #[instrument(
        skip(self, content),
        fields(agent = %agent_id, content_length = content.len(), threshold)
    )]
    #[allow(clippy::cast_possible_truncation)]
    pub fn check_duplicate_at(
        &self,
        agent_id: &str,
        content: &str,
        threshold: f32,
        now: u64,
    ) -> Result<DuplicateCheckResult> {
        if agent_id.is_empty() {
            return Err(Error::InvalidInput("agent id must not be empty".to_string()));
        }
        if content.is_empty() {
            return Err(Error::InvalidInput("content must not be empty".to_string()));
        }
        let threshold = if threshold.is_nan() {
            0.0
        } else {
            threshold.clamp(0.0, 1.0)
        };

        let start = Instant::now();
        metrics::counter!("deduplication_checks_total").increment(1);

        if !self.config.enabled {
            tracing::debug!("Deduplication disabled, skipping check");
            return Ok(DuplicateCheckResult::not_duplicate(0));
        }

        if let Some(result) = self.check_exact_match(agent_id, content, now, start) {
            return Ok(result);
        }

        if threshold > 0.0
            && let Some(result) = self.check_semantic(agent_id, content, threshold, start)
        {
            return Ok(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(duration_ms, "No duplicate found");
        Ok(DuplicateCheckResult::not_duplicate(duration_ms))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn check_exact_match(
        &self,
        agent_id: &str,
        content: &str,
        now: u64,
        start: Instant,
    ) -> Option<DuplicateCheckResult> {
        match self.exact_match.check(agent_id, content, now) {
            Ok(Some(record)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::info!(
                    record_id = %record.id,
                    duration_ms,
                    "Exact match duplicate found"
                );
                metrics::counter!("deduplication_duplicates_total", "reason" => "exact_match")
                    .increment(1);
                Some(DuplicateCheckResult::exact_match(
                    record.id,
                    preview(&record.content, self.config.preview_length),
                    duration_ms,
                ))
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Exact match check failed, continuing");
                None
            },
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn check_semantic(
        &self,
        agent_id: &str,
        content: &str,
        threshold: f32,
        start: Instant,
    ) -> Option<DuplicateCheckResult> {
        match self.semantic.check(agent_id, content, threshold) {
            Ok(Some((record, score))) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                tracing::info!(
                    record_id = %record.id,
                    score,
                    duration_ms,
                    "Similar content duplicate found"
                );
                metrics::counter!("deduplication_duplicates_total", "reason" => "semantic_similar")
                    .increment(1);
                Some(DuplicateCheckResult::semantic_match(
                    record.id,
                    preview(&record.content, self.config.preview_length),
                    score,
                    duration_ms,
                ))
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Similarity check failed, continuing");
                None
            },
        }
    }
}
