//! Background annotation passes with a concurrency bulkhead.
//!
//! A pass rebuilds connection counts, centrality and pattern annotations for
//! one agent's recent records without going through the WAKE/SLEEP state
//! machine. Passes run on the blocking pool; a semaphore caps how many run at
//! once, and each pass polls a [`CancellationFlag`] between phases and between
//! record writes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use katra::services::consolidation::{BackgroundConfig, BackgroundConsolidator};
//!
//! let runner = BackgroundConsolidator::new(store, graph, detector, BackgroundConfig::default());
//! let handle = runner.submit("ci-alpha", since).await?;
//! let report = handle.join().await?;
//! ```

use crate::models::{GraphStats, MemoryQuery, Tier};
use crate::services::graph::ConnectionGraph;
use crate::services::patterns::PatternDetector;
use crate::storage::RecordStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Configuration for the background bulkhead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Maximum passes running at once.
    ///
    /// Default: 2.
    pub max_concurrent: usize,

    /// Timeout for acquiring a permit in milliseconds (0 = wait indefinitely).
    ///
    /// Default: 30000ms.
    pub acquire_timeout_ms: u64,

    /// Whether to reject a pass immediately when the bulkhead is full.
    ///
    /// Default: false (wait for a permit).
    pub fail_fast: bool,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_concurrent: 2,
            acquire_timeout_ms: 30_000,
            fail_fast: false,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `KATRA_BACKGROUND_MAX_CONCURRENT` | Max concurrent passes | 2 |
    /// | `KATRA_BACKGROUND_ACQUIRE_TIMEOUT_MS` | Permit timeout | 30000 |
    /// | `KATRA_BACKGROUND_FAIL_FAST` | Reject when full | false |
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("KATRA_BACKGROUND_MAX_CONCURRENT")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.max_concurrent = parsed.max(1);
        }
        if let Ok(v) = std::env::var("KATRA_BACKGROUND_ACQUIRE_TIMEOUT_MS")
            && let Ok(parsed) = v.parse::<u64>()
        {
            self.acquire_timeout_ms = parsed;
        }
        if let Ok(v) = std::env::var("KATRA_BACKGROUND_FAIL_FAST") {
            self.fail_fast = v.to_lowercase() == "true" || v == "1";
        }
        self
    }

    /// Sets the maximum concurrent passes.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the acquire timeout in milliseconds.
    #[must_use]
    pub const fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Sets whether to fail fast when the bulkhead is full.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Cooperative cancellation shared between a pass and its handle.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of one background pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationReport {
    /// Agent whose records were annotated.
    pub agent_id: String,
    /// Records loaded from the store.
    pub records_scanned: usize,
    /// Graph statistics of the pass.
    pub graph: GraphStats,
    /// Patterns detected.
    pub patterns_found: usize,
    /// Annotations written back.
    pub annotations_written: usize,
    /// Whether the pass stopped early.
    pub cancelled: bool,
}

/// Handle to a running background pass.
#[derive(Debug)]
pub struct AnnotationHandle {
    cancel: CancellationFlag,
    task: JoinHandle<Result<AnnotationReport>>,
}

impl AnnotationHandle {
    /// Requests cancellation. Annotations already written stay written.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the pass to finish.
    ///
    /// # Errors
    ///
    /// Returns the pass's own error, or [`Error::OperationFailed`] if the
    /// task panicked.
    pub async fn join(self) -> Result<AnnotationReport> {
        self.task
            .await
            .map_err(|e| Error::operation_failed("background_annotation_join", e))?
    }
}

/// Runs annotation passes on the blocking pool behind a semaphore.
pub struct BackgroundConsolidator {
    store: Arc<dyn RecordStore>,
    graph: ConnectionGraph,
    detector: PatternDetector,
    config: BackgroundConfig,
    semaphore: Arc<Semaphore>,
}

impl std::fmt::Debug for BackgroundConsolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundConsolidator")
            .field("config", &self.config)
            .field("available_permits", &self.available_permits())
            .finish_non_exhaustive()
    }
}

impl BackgroundConsolidator {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        graph: ConnectionGraph,
        detector: PatternDetector,
        config: BackgroundConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            store,
            graph,
            detector,
            config,
            semaphore,
        }
    }

    /// Returns the current number of available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Starts a pass over `agent_id`'s tier-1 records created at or after `since`.
    ///
    /// The permit is acquired before this returns and released when the pass
    /// ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLimit`] when the bulkhead is full in fail-fast
    /// mode or the acquire timeout elapses.
    pub async fn submit(&self, agent_id: &str, since: u64) -> Result<AnnotationHandle> {
        let permit = self.acquire_permit().await?;

        let cancel = CancellationFlag::new();
        let flag = cancel.clone();
        let store = Arc::clone(&self.store);
        let graph = self.graph;
        let detector = self.detector;
        let agent = agent_id.to_string();

        tracing::debug!(agent = %agent, since, "Starting background annotation pass");
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            run_pass(store.as_ref(), &graph, &detector, &agent, since, &flag)
        });

        Ok(AnnotationHandle { cancel, task })
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        let available = self.semaphore.available_permits();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("background_bulkhead_available_permits").set(available as f64);

        if self.config.fail_fast {
            return Arc::clone(&self.semaphore).try_acquire_owned().map_err(|_| {
                metrics::counter!("background_bulkhead_rejections_total", "reason" => "full")
                    .increment(1);
                Error::ResourceLimit {
                    operation: "background_submit".to_string(),
                    limit: format!(
                        "background bulkhead full: {} passes running (max: {})",
                        self.config.max_concurrent.max(1) - available,
                        self.config.max_concurrent.max(1)
                    ),
                }
            });
        }

        let acquire = Arc::clone(&self.semaphore).acquire_owned();
        let permit = if self.config.acquire_timeout_ms == 0 {
            acquire.await
        } else {
            let timeout = Duration::from_millis(self.config.acquire_timeout_ms);
            tokio::time::timeout(timeout, acquire).await.map_err(|_| {
                metrics::counter!("background_bulkhead_rejections_total", "reason" => "timeout")
                    .increment(1);
                Error::ResourceLimit {
                    operation: "background_submit".to_string(),
                    limit: format!("permit not acquired within {}ms", timeout.as_millis()),
                }
            })?
        };
        permit.map_err(|e| Error::operation_failed("background_submit", e))
    }
}

/// Runs one annotation pass synchronously.
///
/// Checks `cancel` before each phase and before each annotation write; a
/// cancelled pass returns a report with `cancelled` set rather than an error.
///
/// # Errors
///
/// Returns an error if the record query fails. Individual annotation failures
/// are logged and skipped.
pub fn run_pass(
    store: &dyn RecordStore,
    graph: &ConnectionGraph,
    detector: &PatternDetector,
    agent_id: &str,
    since: u64,
    cancel: &CancellationFlag,
) -> Result<AnnotationReport> {
    let mut report = AnnotationReport {
        agent_id: agent_id.to_string(),
        ..AnnotationReport::default()
    };
    if cancel.is_cancelled() {
        report.cancelled = true;
        return Ok(report);
    }

    let query = MemoryQuery::for_agent(agent_id)
        .since(since)
        .with_tier(Tier::Raw);
    let mut records = store.query(&query)?;
    report.records_scanned = records.len();

    if cancel.is_cancelled() {
        report.cancelled = true;
        store.free(records);
        return Ok(report);
    }
    report.graph = graph.calculate_centrality(&mut records);

    if cancel.is_cancelled() {
        report.cancelled = true;
        store.free(records);
        return Ok(report);
    }
    report.patterns_found = detector.detect_patterns(&mut records).len();

    for record in &records {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        match store.annotate(&record.id, &record.annotation()) {
            Ok(true) => report.annotations_written += 1,
            Ok(false) => {},
            Err(e) => {
                tracing::warn!(record_id = %record.id, error = %e, "Failed to annotate record");
            },
        }
    }
    store.free(records);

    metrics::counter!("background_passes_total", "cancelled" => report.cancelled.to_string())
        .increment(1);
    tracing::info!(
        agent = %report.agent_id,
        scanned = report.records_scanned,
        patterns = report.patterns_found,
        written = report.annotations_written,
        cancelled = report.cancelled,
        "Background annotation pass finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryRecord, MemoryType, RecordAnnotation, RecordId};
    use crate::storage::InMemoryRecordStore;

    /// Delays every query so a pass holds its permit for a while.
    struct SlowStore {
        inner: InMemoryRecordStore,
        delay: Duration,
    }

    impl RecordStore for SlowStore {
        fn store(&self, record: &MemoryRecord) -> Result<()> {
            self.inner.store(record)
        }

        fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryRecord>> {
            std::thread::sleep(self.delay);
            self.inner.query(query)
        }

        fn annotate(&self, id: &RecordId, annotation: &RecordAnnotation) -> Result<bool> {
            self.inner.annotate(id, annotation)
        }
    }

    /// Cancels the shared flag after a chosen store call.
    struct CancellingStore {
        inner: Arc<InMemoryRecordStore>,
        flag: CancellationFlag,
        on_query: bool,
    }

    impl RecordStore for CancellingStore {
        fn store(&self, record: &MemoryRecord) -> Result<()> {
            self.inner.store(record)
        }

        fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryRecord>> {
            let records = self.inner.query(query);
            if self.on_query {
                self.flag.cancel();
            }
            records
        }

        fn annotate(&self, id: &RecordId, annotation: &RecordAnnotation) -> Result<bool> {
            let written = self.inner.annotate(id, annotation);
            if !self.on_query {
                self.flag.cancel();
            }
            written
        }
    }

    fn seeded_store() -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        for content in [
            "refactoring storage layer transactions",
            "refactoring storage layer indexes",
            "refactoring storage layer caching",
            "lunch order unrelated note",
        ] {
            store
                .store(&MemoryRecord::new("ci", MemoryType::Experience, content, 0.5))
                .unwrap();
        }
        store
    }

    fn runner(store: Arc<dyn RecordStore>, config: BackgroundConfig) -> BackgroundConsolidator {
        BackgroundConsolidator::new(store, ConnectionGraph::new(), PatternDetector::new(), config)
    }

    #[test]
    fn test_background_config_default() {
        let config = BackgroundConfig::default();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.acquire_timeout_ms, 30_000);
        assert!(!config.fail_fast);
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_run_pass_cancelled_up_front() {
        let store = seeded_store();
        let flag = CancellationFlag::new();
        flag.cancel();

        let report = run_pass(
            store.as_ref(),
            &ConnectionGraph::new(),
            &PatternDetector::new(),
            "ci",
            0,
            &flag,
        )
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.records_scanned, 0);
        assert_eq!(report.annotations_written, 0);
        let records = store.query(&MemoryQuery::for_agent("ci")).unwrap();
        assert!(records.iter().all(|r| r.connection_count == 0));
    }

    #[test]
    fn test_run_pass_cancelled_after_query() {
        let flag = CancellationFlag::new();
        let store = CancellingStore {
            inner: seeded_store(),
            flag: flag.clone(),
            on_query: true,
        };

        let report = run_pass(
            &store,
            &ConnectionGraph::new(),
            &PatternDetector::new(),
            "ci",
            0,
            &flag,
        )
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.records_scanned, 4);
        assert_eq!(report.patterns_found, 0);
        assert_eq!(report.annotations_written, 0);
        let records = store.inner.query(&MemoryQuery::for_agent("ci")).unwrap();
        assert!(records.iter().all(|r| r.connection_count == 0));
    }

    #[test]
    fn test_run_pass_cancelled_between_writes() {
        let flag = CancellationFlag::new();
        let store = CancellingStore {
            inner: seeded_store(),
            flag: flag.clone(),
            on_query: false,
        };

        let report = run_pass(
            &store,
            &ConnectionGraph::new(),
            &PatternDetector::new(),
            "ci",
            0,
            &flag,
        )
        .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.records_scanned, 4);
        assert_eq!(report.annotations_written, 1);
        assert!(report.annotations_written < report.records_scanned);
        let records = store.inner.query(&MemoryQuery::for_agent("ci")).unwrap();
        let annotated = records.iter().filter(|r| r.connection_count > 0).count();
        assert_eq!(annotated, 1);
    }

    #[tokio::test]
    async fn test_submit_annotates_records() {
        let store = seeded_store();
        let runner = runner(store.clone(), BackgroundConfig::default());

        let report = runner.submit("ci", 0).await.unwrap().join().await.unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.records_scanned, 4);
        assert_eq!(report.patterns_found, 1);
        assert_eq!(report.annotations_written, 4);
        assert_eq!(report.graph.edges, 3);

        let records = store.query(&MemoryQuery::for_agent("ci")).unwrap();
        let patterned = records.iter().filter(|r| r.pattern_id.is_some()).count();
        assert_eq!(patterned, 3);
        assert_eq!(runner.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_fail_fast_when_full() {
        let store = Arc::new(SlowStore {
            inner: InMemoryRecordStore::new(),
            delay: Duration::from_millis(200),
        });
        let config = BackgroundConfig::new()
            .with_max_concurrent(1)
            .with_fail_fast(true);
        let runner = runner(store, config);

        let first = runner.submit("ci", 0).await.unwrap();
        let second = runner.submit("ci", 0).await;

        assert!(matches!(second, Err(Error::ResourceLimit { .. })));
        first.join().await.unwrap();
        assert_eq!(runner.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_acquire_timeout() {
        let store = Arc::new(SlowStore {
            inner: InMemoryRecordStore::new(),
            delay: Duration::from_millis(300),
        });
        let config = BackgroundConfig::new()
            .with_max_concurrent(1)
            .with_acquire_timeout_ms(20);
        let runner = runner(store, config);

        let first = runner.submit("ci", 0).await.unwrap();
        let err = runner.submit("ci", 0).await.unwrap_err();

        assert!(err.to_string().contains("20ms"));
        first.join().await.unwrap();
    }
}
