//! WAKE/SLEEP memory consolidation.
//!
//! During WAKE an agent captures memories, consciously or through the
//! conversation analyzer. During SLEEP the records captured since WAKE began
//! are strength-classified, linked into the connection graph and scanned for
//! patterns. Completing SLEEP returns a stats snapshot and starts a new cycle.
//!
//! ```text
//!             sleep_begin
//!   WAKE  ─────────────────▶  SLEEP
//!   capture                  route_by_strength
//!   analyze                  calculate_centrality
//!         ◀─────────────────  extract_patterns
//!            sleep_complete
//! ```

mod analyzer;
pub mod background;
mod strength;

pub use analyzer::{ConversationAnalyzer, MemoryCandidate};
pub use background::{
    AnnotationHandle, AnnotationReport, BackgroundConfig, BackgroundConsolidator,
    CancellationFlag,
};
pub use strength::{StrengthThresholds, strength_score};

use crate::models::{
    ConsolidationMode, ConsolidationStats, GraphStats, MemoryPathway, MemoryQuery, MemoryRecord,
    MemoryStrength, RecordId, Tier,
};
use crate::services::graph::ConnectionGraph;
use crate::services::patterns::PatternDetector;
use crate::storage::RecordStore;
use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Consolidation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Strength score cut-offs.
    pub thresholds: StrengthThresholds,
    /// Write graph and pattern annotations back to the store.
    pub persist_annotations: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            thresholds: StrengthThresholds::default(),
            persist_annotations: true,
        }
    }
}

/// Consolidation state machine for one agent.
///
/// Owned by one session at a time; the record store is the only shared state.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use katra::services::ConsolidationService;
/// use katra::storage::InMemoryRecordStore;
/// use katra::{ConsolidationMode, MemoryPathway, MemoryRecord, MemoryType};
///
/// let store = Arc::new(InMemoryRecordStore::new());
/// let mut service = ConsolidationService::new("ci-alpha", store);
///
/// let record = MemoryRecord::new("ci-alpha", MemoryType::Decision, "Ship on Fridays never", 0.9);
/// service.capture(record, MemoryPathway::Conscious)?;
///
/// let stats = service.run_sleep_cycle()?;
/// assert_eq!(stats.memories_processed, 1);
/// assert_eq!(stats.high_strength_preserved, 1);
/// assert_eq!(service.mode(), ConsolidationMode::Wake);
/// # Ok::<(), katra::Error>(())
/// ```
pub struct ConsolidationService {
    agent_id: String,
    store: Arc<dyn RecordStore>,
    analyzer: Option<Arc<dyn ConversationAnalyzer>>,
    graph: ConnectionGraph,
    detector: PatternDetector,
    config: ConsolidationConfig,
    mode: ConsolidationMode,
    stats: ConsolidationStats,
}

impl std::fmt::Debug for ConsolidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationService")
            .field("agent_id", &self.agent_id)
            .field("mode", &self.mode)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ConsolidationService {
    /// Creates a service in WAKE mode.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, store: Arc<dyn RecordStore>) -> Self {
        let stats = ConsolidationStats {
            wake_started: current_timestamp(),
            ..ConsolidationStats::default()
        };
        Self {
            agent_id: agent_id.into(),
            store,
            analyzer: None,
            graph: ConnectionGraph::new(),
            detector: PatternDetector::new(),
            config: ConsolidationConfig::default(),
            mode: ConsolidationMode::Wake,
            stats,
        }
    }

    /// Sets the conversation analyzer used by [`analyze`](Self::analyze).
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ConversationAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Sets the connection graph used by the centrality pass.
    #[must_use]
    pub const fn with_graph(mut self, graph: ConnectionGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Sets the pattern detector used by the pattern pass.
    #[must_use]
    pub const fn with_detector(mut self, detector: PatternDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: ConsolidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Owning agent.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> ConsolidationMode {
        self.mode
    }

    /// Running statistics of the current cycle.
    #[must_use]
    pub const fn stats(&self) -> &ConsolidationStats {
        &self.stats
    }

    /// Stores a record captured during WAKE.
    #[instrument(skip(self, record), fields(agent = %self.agent_id, pathway = %pathway))]
    pub fn capture(&mut self, record: MemoryRecord, pathway: MemoryPathway) -> Result<RecordId> {
        self.require_mode(ConsolidationMode::Wake, "capture")?;
        if record.agent_id != self.agent_id {
            return Err(Error::InvalidInput(format!(
                "record belongs to '{}', not '{}'",
                record.agent_id, self.agent_id
            )));
        }

        self.store.store(&record)?;
        self.stats.memories_captured += 1;
        match pathway {
            MemoryPathway::Conscious => self.stats.conscious_formations += 1,
            MemoryPathway::Subconscious => self.stats.subconscious_formations += 1,
        }
        metrics::counter!("consolidation_captures_total", "pathway" => pathway.as_str())
            .increment(1);
        Ok(record.id)
    }

    /// Runs the conversation analyzer over an exchange and stores its candidates.
    ///
    /// A no-op outside WAKE. Returns the number of candidates stored; a
    /// candidate that fails to store is logged and skipped.
    #[instrument(skip(self, input, response), fields(agent = %self.agent_id))]
    pub fn analyze(&mut self, input: &str, response: &str) -> Result<usize> {
        if self.mode != ConsolidationMode::Wake {
            tracing::debug!(mode = %self.mode, "Skipping conversation analysis outside WAKE");
            return Ok(0);
        }
        let analyzer = self
            .analyzer
            .as_ref()
            .ok_or_else(|| Error::invalid_state("analyze", "no conversation analyzer configured"))?;

        let candidates = analyzer.analyze(&self.agent_id, input, response)?;
        let mut stored = 0;
        for candidate in candidates {
            let record = self
                .store
                .create(
                    &self.agent_id,
                    candidate.memory_type,
                    &candidate.content,
                    candidate.importance,
                )
                .with_context(candidate.reason);

            if let Err(e) = self.store.store(&record) {
                tracing::warn!(record_id = %record.id, error = %e, "Failed to store memory candidate");
                continue;
            }
            stored += 1;
            self.stats.memories_captured += 1;
            self.stats.subconscious_formations += 1;
            if candidate.converged {
                self.stats.convergences += 1;
            }
        }

        tracing::debug!(stored, "Conversation analysis complete");
        Ok(stored)
    }

    /// Enters SLEEP. Idempotent.
    pub fn sleep_begin(&mut self) {
        if self.mode == ConsolidationMode::Sleep {
            tracing::debug!(agent = %self.agent_id, "Already in SLEEP");
            return;
        }
        self.mode = ConsolidationMode::Sleep;
        self.stats.sleep_started = current_timestamp();

        tracing::info!(
            agent = %self.agent_id,
            captured = self.stats.memories_captured,
            conscious = self.stats.conscious_formations,
            subconscious = self.stats.subconscious_formations,
            convergences = self.stats.convergences,
            "SLEEP: Beginning consolidation"
        );
    }

    /// Classifies a record with the configured thresholds.
    #[must_use]
    pub fn classify_strength(&self, record: &MemoryRecord) -> MemoryStrength {
        self.config.thresholds.classify(record)
    }

    /// Tallies the session's records by strength. Returns the number routed.
    ///
    /// Only classifies; no record is rewritten or compressed.
    #[instrument(skip(self), fields(agent = %self.agent_id))]
    pub fn route_by_strength(&mut self) -> Result<usize> {
        self.require_mode(ConsolidationMode::Sleep, "route_by_strength")?;
        let start = Instant::now();
        let records = self.session_records()?;

        let (mut high, mut medium, mut low) = (0, 0, 0);
        for record in &records {
            match self.classify_strength(record) {
                MemoryStrength::High => high += 1,
                MemoryStrength::Medium => medium += 1,
                MemoryStrength::Low => low += 1,
            }
        }

        self.stats.memories_processed = records.len();
        self.stats.high_strength_preserved = high;
        self.stats.medium_strength_summarized = medium;
        self.stats.low_strength_archived = low;
        self.store.free(records);

        record_pass_duration("route", start);
        tracing::info!(high, medium, low, "SLEEP: Routed memories");
        Ok(self.stats.memories_processed)
    }

    /// Rebuilds connections and centrality over the session's records.
    #[instrument(skip(self), fields(agent = %self.agent_id))]
    pub fn calculate_centrality(&mut self) -> Result<GraphStats> {
        self.require_mode(ConsolidationMode::Sleep, "calculate_centrality")?;
        let start = Instant::now();
        let mut records = self.session_records()?;

        let graph_stats = self.graph.calculate_centrality(&mut records);
        self.persist_annotations(&records);

        self.stats.centrality_updates = records.len();
        self.stats.graph_nodes = graph_stats.nodes;
        self.stats.graph_edges = graph_stats.edges;
        self.stats.avg_degree = graph_stats.avg_degree;
        self.store.free(records);

        record_pass_duration("centrality", start);
        Ok(graph_stats)
    }

    /// Detects patterns over the session's records. Returns the pattern count.
    #[instrument(skip(self), fields(agent = %self.agent_id))]
    pub fn extract_patterns(&mut self) -> Result<usize> {
        self.require_mode(ConsolidationMode::Sleep, "extract_patterns")?;
        let start = Instant::now();
        let mut records = self.session_records()?;

        let patterns = self.detector.detect_patterns(&mut records);
        self.persist_annotations(&records);

        self.stats.patterns_extracted = patterns.len();
        self.store.free(records);

        record_pass_duration("patterns", start);
        tracing::info!(patterns = patterns.len(), "SLEEP: Extracted patterns");
        Ok(patterns.len())
    }

    /// Leaves SLEEP and returns the cycle's statistics.
    ///
    /// Returns `None` if already in WAKE.
    pub fn sleep_complete(&mut self) -> Option<ConsolidationStats> {
        if self.mode == ConsolidationMode::Wake {
            return None;
        }

        let now = current_timestamp();
        self.stats.sleep_completed = now;
        self.stats.consolidation_duration = now.saturating_sub(self.stats.sleep_started);
        let snapshot = self.stats.clone();

        tracing::info!(
            agent = %self.agent_id,
            duration_secs = snapshot.consolidation_duration,
            summary = %snapshot.summary(),
            "SLEEP: Consolidation complete"
        );

        self.mode = ConsolidationMode::Wake;
        self.stats.reset_wake_counters(now);
        self.stats.reset_sleep_counters();
        Some(snapshot)
    }

    /// Runs a full SLEEP cycle: begin, route, centrality, patterns, complete.
    pub fn run_sleep_cycle(&mut self) -> Result<ConsolidationStats> {
        self.sleep_begin();
        self.route_by_strength()?;
        self.calculate_centrality()?;
        self.extract_patterns()?;
        self.sleep_complete()
            .ok_or_else(|| Error::invalid_state("run_sleep_cycle", "SLEEP ended unexpectedly"))
    }

    /// Tier-1 records of this agent captured since WAKE began.
    fn session_records(&self) -> Result<Vec<MemoryRecord>> {
        let query = MemoryQuery::for_agent(&self.agent_id)
            .with_time_range(self.stats.wake_started, current_timestamp())
            .with_tier(Tier::Raw);
        self.store.query(&query)
    }

    fn persist_annotations(&self, records: &[MemoryRecord]) {
        if !self.config.persist_annotations {
            return;
        }
        for record in records {
            match self.store.annotate(&record.id, &record.annotation()) {
                Ok(true) => {},
                Ok(false) => {
                    tracing::debug!(record_id = %record.id, "Record vanished before annotation");
                },
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "Failed to annotate record");
                },
            }
        }
    }

    fn require_mode(&self, expected: ConsolidationMode, operation: &str) -> Result<()> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(Error::invalid_state(
                operation,
                format!("requires {expected}, consolidation is in {}", self.mode),
            ))
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_pass_duration(pass: &'static str, start: Instant) {
    metrics::histogram!("consolidation_pass_duration_ms", "pass" => pass)
        .record(start.elapsed().as_secs_f64() * 1000.0);
}
