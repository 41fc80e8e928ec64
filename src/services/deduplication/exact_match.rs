//! Exact match deduplication checker.
//!
//! Compares the normalized SHA256 hash of new content against the agent's
//! records created inside the recency window.

use crate::Result;
use crate::models::{MemoryQuery, MemoryRecord};
use crate::storage::RecordStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

use super::hasher::ContentHasher;

/// Checker for exact content matches within a recency window.
pub struct ExactMatchChecker {
    store: Arc<dyn RecordStore>,
    window: Duration,
}

impl ExactMatchChecker {
    /// Creates a new exact match checker.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Returns the first record of `agent_id` created in `[now - window, now]`
    /// whose normalized content hashes the same as `content`.
    #[instrument(
        skip(self, content),
        fields(operation = "exact_match_check", content_length = content.len())
    )]
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for duration metrics
    pub fn check(&self, agent_id: &str, content: &str, now: u64) -> Result<Option<MemoryRecord>> {
        let start = Instant::now();
        let hash = ContentHasher::hash(content);

        let since = now.saturating_sub(self.window.as_secs());
        let query = MemoryQuery::for_agent(agent_id).with_time_range(since, now);
        let candidates = self.store.query(&query)?;
        let scanned = candidates.len();

        let found = candidates
            .into_iter()
            .find(|record| ContentHasher::hash(&record.content) == hash);

        metrics::histogram!(
            "deduplication_check_duration_ms",
            "checker" => "exact_match",
            "found" => if found.is_some() { "true" } else { "false" }
        )
        .record(start.elapsed().as_millis() as f64);

        tracing::debug!(scanned, found = found.is_some(), "Exact match scan complete");
        Ok(found)
    }
}
