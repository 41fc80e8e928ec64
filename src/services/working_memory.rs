//! Working memory: a small attention-weighted buffer in front of the store.
//!
//! Capacity is bounded to 5..=9 items (default 7). When the buffer is full,
//! the lowest-attention item is pushed to the record store and dropped, so
//! eviction order follows attention, not insertion. Periodic consolidation
//! shrinks the buffer to 60% of capacity, keeping the highest-attention items.

// Allow cast_precision_loss for counts converted to f32 ratios.
#![allow(clippy::cast_precision_loss)]
// Allow cast_possible_truncation/sign_loss for the 60% consolidation target.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::models::{Experience, RecordId, clamp_unit};
use crate::storage::RecordStore;
use crate::{Error, Result, current_timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::instrument;

/// Smallest allowed capacity.
pub const MIN_CAPACITY: usize = 5;

/// Largest allowed capacity.
pub const MAX_CAPACITY: usize = 9;

/// Default capacity.
pub const DEFAULT_CAPACITY: usize = 7;

/// Working memory configuration.
///
/// # Environment Variables
///
/// | Variable | Type | Default |
/// |----------|------|---------|
/// | `KATRA_WM_CAPACITY` | usize | `7` |
/// | `KATRA_WM_CONSOLIDATION_INTERVAL_SECS` | u64 | `300` |
/// | `KATRA_WM_CAPACITY_THRESHOLD` | f32 | `0.8` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemoryConfig {
    /// Buffer capacity, clamped to 5..=9.
    pub capacity: usize,
    /// Seconds after which consolidation is due regardless of fill.
    pub consolidation_interval_secs: u64,
    /// Fill ratio at which consolidation is due.
    pub capacity_threshold: f32,
    /// Fraction of capacity kept by consolidation.
    pub consolidation_target_ratio: f32,
}

impl Default for WorkingMemoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            consolidation_interval_secs: 300,
            capacity_threshold: 0.8,
            consolidation_target_ratio: 0.6,
        }
    }
}

impl WorkingMemoryConfig {
    /// Loads configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `KATRA_WM_*` environment variables on top of `self`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("KATRA_WM_CAPACITY")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.capacity = parsed.clamp(MIN_CAPACITY, MAX_CAPACITY);
        }
        if let Ok(v) = std::env::var("KATRA_WM_CONSOLIDATION_INTERVAL_SECS")
            && let Ok(parsed) = v.parse::<u64>()
        {
            self.consolidation_interval_secs = parsed;
        }
        if let Ok(v) = std::env::var("KATRA_WM_CAPACITY_THRESHOLD")
            && let Ok(parsed) = v.parse::<f32>()
        {
            self.capacity_threshold = clamp_unit(parsed);
        }
        self
    }

    /// Builder method to set the capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder method to set the consolidation interval.
    #[must_use]
    pub const fn with_consolidation_interval_secs(mut self, secs: u64) -> Self {
        self.consolidation_interval_secs = secs;
        self
    }
}

/// An experience held in working memory.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingMemoryItem {
    /// The held experience.
    pub experience: Experience,
    /// Attention weight (0.0 to 1.0).
    pub attention_score: f32,
    /// When the item was admitted.
    pub added_time: u64,
    /// When the item was last accessed.
    pub last_accessed: u64,
}

/// Snapshot of a buffer's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkingMemoryStats {
    /// Items currently held.
    pub count: usize,
    /// Buffer capacity.
    pub capacity: usize,
    /// Mean attention over held items (0.0 when empty).
    pub avg_attention: f32,
    /// Seconds since the last consolidation.
    pub time_since_consolidation: u64,
    /// Items ever added.
    pub total_adds: usize,
    /// Items ever evicted to the store.
    pub total_evictions: usize,
    /// Consolidation runs that evicted at least one item.
    pub total_consolidations: usize,
    /// Items evicted by consolidation runs.
    pub items_consolidated: usize,
}

/// Bounded attention buffer for one agent.
///
/// Owned by one session at a time; no internal locking.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use katra::services::WorkingMemoryBuffer;
/// use katra::storage::InMemoryRecordStore;
/// use katra::{Experience, MemoryRecord, MemoryType};
///
/// let store = Arc::new(InMemoryRecordStore::new());
/// let mut buffer = WorkingMemoryBuffer::new("ci-alpha", 5, store.clone());
/// for i in 0..6 {
///     let record = MemoryRecord::new("ci-alpha", MemoryType::Experience, format!("event {i}"), 0.5);
///     buffer.add(Experience::new(record), 0.1 * i as f32)?;
/// }
/// assert_eq!(buffer.len(), 5);
/// assert_eq!(store.len(), 1);
/// # Ok::<(), katra::Error>(())
/// ```
pub struct WorkingMemoryBuffer {
    agent_id: String,
    items: Vec<WorkingMemoryItem>,
    config: WorkingMemoryConfig,
    store: Arc<dyn RecordStore>,
    last_consolidation: u64,
    total_adds: usize,
    total_evictions: usize,
    total_consolidations: usize,
    items_consolidated: usize,
}

impl std::fmt::Debug for WorkingMemoryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingMemoryBuffer")
            .field("agent_id", &self.agent_id)
            .field("count", &self.items.len())
            .field("capacity", &self.config.capacity)
            .finish_non_exhaustive()
    }
}

impl WorkingMemoryBuffer {
    /// Creates a buffer with default settings and the given capacity.
    ///
    /// Capacity is clamped to 5..=9.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, capacity: usize, store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(
            agent_id,
            WorkingMemoryConfig::default().with_capacity(capacity),
            store,
        )
    }

    /// Creates a buffer from a configuration.
    #[must_use]
    pub fn with_config(
        agent_id: impl Into<String>,
        mut config: WorkingMemoryConfig,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        config.capacity = config.capacity.clamp(MIN_CAPACITY, MAX_CAPACITY);
        config.capacity_threshold = clamp_unit(config.capacity_threshold);
        config.consolidation_target_ratio = clamp_unit(config.consolidation_target_ratio);
        let agent_id = agent_id.into();
        tracing::debug!(agent = %agent_id, capacity = config.capacity, "Working memory initialized");
        Self {
            agent_id,
            items: Vec::with_capacity(config.capacity),
            config,
            store,
            last_consolidation: current_timestamp(),
            total_adds: 0,
            total_evictions: 0,
            total_consolidations: 0,
            items_consolidated: 0,
        }
    }

    /// Owning agent.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Maximum number of items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WorkingMemoryItem> {
        self.items.get(index)
    }

    /// Iterates over held items in buffer order.
    pub fn iter(&self) -> std::slice::Iter<'_, WorkingMemoryItem> {
        self.items.iter()
    }

    /// Admits an experience, evicting the lowest-attention item if full.
    ///
    /// Attention is clamped to 0.0..=1.0. Returns the ID of the evicted record,
    /// if any. If the evicted record cannot be stored the add fails and the
    /// buffer is left unchanged.
    #[instrument(skip(self, experience), fields(agent = %self.agent_id, attention))]
    pub fn add(&mut self, experience: Experience, attention: f32) -> Result<Option<RecordId>> {
        let attention = clamp_unit(attention);

        let evicted = if self.items.len() >= self.config.capacity {
            let index = self.lowest_attention_index();
            tracing::debug!(index, "Working memory full, evicting lowest attention item");
            Some(self.evict(index)?)
        } else {
            None
        };

        let now = current_timestamp();
        self.items.push(WorkingMemoryItem {
            experience,
            attention_score: attention,
            added_time: now,
            last_accessed: now,
        });
        self.total_adds += 1;

        if self.needs_consolidation_at(now) {
            tracing::debug!(
                count = self.items.len(),
                capacity = self.config.capacity,
                "Working memory consolidation due"
            );
        }
        Ok(evicted)
    }

    /// Boosts the attention of the item at `index` and records the access.
    pub fn access(&mut self, index: usize, boost: f32) -> Result<()> {
        let len = self.items.len();
        let item = self.items.get_mut(index).ok_or_else(|| {
            Error::InvalidInput(format!("working memory index {index} out of range (len {len})"))
        })?;

        let now = current_timestamp();
        item.attention_score = clamp_unit(item.attention_score + boost);
        item.last_accessed = now;
        item.experience.record.access_count = item.experience.record.access_count.saturating_add(1);
        item.experience.record.last_accessed = now;
        Ok(())
    }

    /// Multiplies every attention score by `1 - rate`, rate clamped to 0.0..=1.0.
    pub fn decay(&mut self, rate: f32) {
        let factor = 1.0 - clamp_unit(rate);
        for item in &mut self.items {
            item.attention_score *= factor;
        }
    }

    /// Returns true if the buffer is nearly full or consolidation is overdue.
    #[must_use]
    pub fn needs_consolidation(&self) -> bool {
        self.needs_consolidation_at(current_timestamp())
    }

    /// Same as [`needs_consolidation`](Self::needs_consolidation) at time `now`.
    #[must_use]
    pub fn needs_consolidation_at(&self, now: u64) -> bool {
        let fill = self.items.len() as f32 / self.config.capacity as f32;
        fill >= self.config.capacity_threshold
            || now.saturating_sub(self.last_consolidation) >= self.config.consolidation_interval_secs
    }

    /// Shrinks the buffer to 60% of capacity, keeping the highest-attention items.
    ///
    /// Returns the number of items evicted to the store. If a store fails
    /// part way, the items already evicted still count as a consolidation
    /// and the error is returned.
    #[instrument(skip(self), fields(agent = %self.agent_id, count = self.items.len()))]
    pub fn consolidate(&mut self) -> Result<usize> {
        let target = self.consolidation_target();
        if self.items.len() <= target {
            tracing::debug!(count = self.items.len(), target, "No consolidation needed");
            return Ok(0);
        }

        // Stable: equal scores keep buffer order.
        self.items.sort_by(|a, b| {
            b.attention_score
                .partial_cmp(&a.attention_score)
                .unwrap_or(Ordering::Equal)
        });

        let mut consolidated = 0;
        while self.items.len() > target {
            let index = self.items.len() - 1;
            if let Err(e) = self.evict(index) {
                if consolidated > 0 {
                    self.record_consolidation(consolidated);
                }
                tracing::warn!(evicted = consolidated, error = %e, "Consolidation stopped early");
                return Err(e);
            }
            consolidated += 1;
        }

        self.record_consolidation(consolidated);

        tracing::info!(
            evicted = consolidated,
            kept = self.items.len(),
            "Consolidated working memory"
        );
        Ok(consolidated)
    }

    /// Empties the buffer, optionally consolidating first.
    ///
    /// Every remaining item is still pushed to the store; a failed store is
    /// logged and the item dropped.
    pub fn clear(&mut self, consolidate_first: bool) {
        if consolidate_first && let Err(e) = self.consolidate() {
            tracing::warn!(error = %e, "Consolidation before clear failed");
        }

        for item in self.items.drain(..) {
            if let Err(e) = self.store.store(&item.experience.record) {
                tracing::error!(
                    record_id = %item.experience.record.id,
                    error = %e,
                    "Failed to store working memory item during clear"
                );
            }
            self.total_evictions += 1;
        }
        tracing::info!(agent = %self.agent_id, "Cleared working memory");
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> WorkingMemoryStats {
        let avg_attention = if self.items.is_empty() {
            0.0
        } else {
            self.items.iter().map(|i| i.attention_score).sum::<f32>() / self.items.len() as f32
        };
        WorkingMemoryStats {
            count: self.items.len(),
            capacity: self.config.capacity,
            avg_attention,
            time_since_consolidation: current_timestamp().saturating_sub(self.last_consolidation),
            total_adds: self.total_adds,
            total_evictions: self.total_evictions,
            total_consolidations: self.total_consolidations,
            items_consolidated: self.items_consolidated,
        }
    }

    fn record_consolidation(&mut self, consolidated: usize) {
        self.last_consolidation = current_timestamp();
        self.total_consolidations += 1;
        self.items_consolidated += consolidated;
    }

    fn consolidation_target(&self) -> usize {
        ((self.config.capacity as f32 * self.config.consolidation_target_ratio) as usize).max(1)
    }

    /// First index holding the minimum attention score.
    fn lowest_attention_index(&self) -> usize {
        let mut lowest = 0;
        for (index, item) in self.items.iter().enumerate().skip(1) {
            if item.attention_score < self.items[lowest].attention_score {
                lowest = index;
            }
        }
        lowest
    }

    /// Stores the record at `index`, then removes it.
    fn evict(&mut self, index: usize) -> Result<RecordId> {
        self.store.store(&self.items[index].experience.record)?;

        let item = self.items.remove(index);
        self.total_evictions += 1;
        metrics::counter!("working_memory_evictions_total").increment(1);
        tracing::debug!(record_id = %item.experience.record.id, "Evicted item to record store");
        Ok(item.experience.record.id)
    }
}

impl<'a> IntoIterator for &'a WorkingMemoryBuffer {
    type Item = &'a WorkingMemoryItem;
    type IntoIter = std::slice::Iter<'a, WorkingMemoryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryQuery, MemoryRecord, MemoryType, RecordAnnotation};
    use crate::storage::InMemoryRecordStore;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use test_case::test_case;

    fn experience(id: &str) -> Experience {
        Experience::new(
            MemoryRecord::new("ci", MemoryType::Experience, format!("event {id}"), 0.5).with_id(id),
        )
    }

    fn buffer(capacity: usize) -> (WorkingMemoryBuffer, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        (WorkingMemoryBuffer::new("ci", capacity, store.clone()), store)
    }

    #[test_case(0, 5 ; "below minimum")]
    #[test_case(7, 7 ; "default")]
    #[test_case(42, 9 ; "above maximum")]
    fn test_capacity_is_clamped(requested: usize, expected: usize) {
        let (buffer, _) = buffer(requested);
        assert_eq!(buffer.capacity(), expected);
    }

    #[test]
    fn test_add_evicts_lowest_attention_when_full() {
        let (mut buffer, store) = buffer(5);
        for (i, attention) in [0.9, 0.1, 0.5, 0.3, 0.8].iter().enumerate() {
            assert!(buffer.add(experience(&format!("e{i}")), *attention).unwrap().is_none());
        }
        let evicted = buffer.add(experience("e5"), 0.95).unwrap();

        assert_eq!(evicted, Some(RecordId::new("e1")));
        assert_eq!(buffer.len(), 5);
        assert!(store.contains(&RecordId::new("e1")));
        assert_eq!(buffer.stats().total_evictions, 1);
        assert_eq!(buffer.stats().total_adds, 6);
    }

    #[test]
    fn test_attention_is_clamped() {
        let (mut buffer, _) = buffer(5);
        buffer.add(experience("a"), 3.0).unwrap();
        buffer.add(experience("b"), -1.0).unwrap();
        assert!((buffer.get(0).unwrap().attention_score - 1.0).abs() < f32::EPSILON);
        assert!(buffer.get(1).unwrap().attention_score.abs() < f32::EPSILON);
    }

    #[test]
    fn test_access_boosts_and_counts() {
        let (mut buffer, _) = buffer(5);
        buffer.add(experience("a"), 0.5).unwrap();
        buffer.access(0, 0.7).unwrap();

        let item = buffer.get(0).unwrap();
        assert!((item.attention_score - 1.0).abs() < f32::EPSILON);
        assert_eq!(item.experience.record.access_count, 1);
    }

    #[test]
    fn test_access_out_of_range() {
        let (mut buffer, _) = buffer(5);
        assert!(matches!(buffer.access(0, 0.1), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decay() {
        let (mut buffer, _) = buffer(5);
        buffer.add(experience("a"), 0.8).unwrap();
        buffer.decay(0.5);
        assert!((buffer.get(0).unwrap().attention_score - 0.4).abs() < 1e-6);
        buffer.decay(5.0);
        assert!(buffer.get(0).unwrap().attention_score.abs() < f32::EPSILON);
    }

    #[test]
    fn test_needs_consolidation_by_fill_and_time() {
        let (mut buffer, _) = buffer(5);
        let now = current_timestamp();
        assert!(!buffer.needs_consolidation_at(now));

        for i in 0..4 {
            buffer.add(experience(&format!("e{i}")), 0.5).unwrap();
        }
        // 4 / 5 = 0.8
        assert!(buffer.needs_consolidation_at(now));

        let (empty, _) = self::buffer(5);
        assert!(empty.needs_consolidation_at(now + 300));
    }

    #[test]
    fn test_consolidate_keeps_highest_attention() {
        let (mut buffer, store) = buffer(5);
        for (i, attention) in [0.2, 0.9, 0.4, 0.7, 0.1].iter().enumerate() {
            buffer.add(experience(&format!("e{i}")), *attention).unwrap();
        }

        // target = floor(5 * 0.6) = 3
        assert_eq!(buffer.consolidate().unwrap(), 2);
        let kept: Vec<&str> = buffer
            .iter()
            .map(|i| i.experience.record.id.as_str())
            .collect();
        assert_eq!(kept, vec!["e1", "e3", "e2"]);
        assert_eq!(store.len(), 2);

        let stats = buffer.stats();
        assert_eq!(stats.total_consolidations, 1);
        assert_eq!(stats.items_consolidated, 2);
        assert_eq!(buffer.consolidate().unwrap(), 0);
        assert_eq!(buffer.stats().total_consolidations, 1);
    }

    #[test]
    fn test_clear_pushes_everything_to_store() {
        let (mut buffer, store) = buffer(7);
        for i in 0..3 {
            buffer.add(experience(&format!("e{i}")), 0.5).unwrap();
        }
        buffer.clear(false);
        assert!(buffer.is_empty());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_stats_average() {
        let (mut buffer, _) = buffer(5);
        assert!(buffer.stats().avg_attention.abs() < f32::EPSILON);
        buffer.add(experience("a"), 0.2).unwrap();
        buffer.add(experience("b"), 0.6).unwrap();
        assert!((buffer.stats().avg_attention - 0.4).abs() < 1e-6);
    }

    struct RejectingStore;

    impl RecordStore for RejectingStore {
        fn store(&self, _record: &MemoryRecord) -> Result<()> {
            Err(Error::operation_failed("store_record", "disk full"))
        }

        fn query(&self, _query: &MemoryQuery) -> Result<Vec<MemoryRecord>> {
            Ok(Vec::new())
        }

        fn annotate(&self, _id: &RecordId, _annotation: &RecordAnnotation) -> Result<bool> {
            Ok(false)
        }
    }

    /// Accepts a fixed number of stores, then fails.
    struct FillingStore {
        remaining: AtomicUsize,
    }

    impl RecordStore for FillingStore {
        fn store(&self, _record: &MemoryRecord) -> Result<()> {
            self.remaining
                .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
                .map(|_| ())
                .map_err(|_| Error::operation_failed("store_record", "disk full"))
        }

        fn query(&self, _query: &MemoryQuery) -> Result<Vec<MemoryRecord>> {
            Ok(Vec::new())
        }

        fn annotate(&self, _id: &RecordId, _annotation: &RecordAnnotation) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_partial_consolidation_is_recorded() {
        let store = Arc::new(FillingStore {
            remaining: AtomicUsize::new(1),
        });
        let mut buffer = WorkingMemoryBuffer::new("ci", 5, store);
        for (i, attention) in [0.2, 0.9, 0.4, 0.7, 0.1].iter().enumerate() {
            buffer.add(experience(&format!("e{i}")), *attention).unwrap();
        }

        // target is 3: the first eviction lands, the second fails.
        assert!(buffer.consolidate().is_err());
        assert_eq!(buffer.len(), 4);
        let stats = buffer.stats();
        assert_eq!(stats.total_evictions, 1);
        assert_eq!(stats.items_consolidated, 1);
        assert_eq!(stats.total_consolidations, 1);
        assert!(stats.time_since_consolidation < 300);
    }

    #[test]
    fn test_failed_eviction_leaves_buffer_unchanged() {
        let mut buffer = WorkingMemoryBuffer::new("ci", 5, Arc::new(RejectingStore));
        for i in 0..5 {
            buffer.add(experience(&format!("e{i}")), 0.5).unwrap();
        }
        let before: Vec<RecordId> = buffer.iter().map(|i| i.experience.record.id.clone()).collect();

        assert!(buffer.add(experience("e5"), 0.9).is_err());
        let after: Vec<RecordId> = buffer.iter().map(|i| i.experience.record.id.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(buffer.stats().total_evictions, 0);
    }
}
