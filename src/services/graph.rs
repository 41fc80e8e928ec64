//! Connection graph and centrality scoring.
//!
//! Two records are connected when either explicitly links to the other, or
//! when they share at least `min_shared_keywords` keywords. Centrality is a
//! record's connection count normalized by the busiest record in the window,
//! with a floor so sparse windows do not inflate scores.
//!
//! Building connections is O(n²) in the window size. Consolidation only runs
//! it over bounded recent windows.

// Allow cast_precision_loss for connection counts converted to f32 scores.
#![allow(clippy::cast_precision_loss)]

use crate::models::{
    ConnectionHub, GraphStats, MemoryRecord, RecordId, RelatedMemory, clamp_unit,
};
use crate::services::keywords::KeywordSet;
use crate::{Error, Result};
use std::cmp::Ordering;
use tracing::instrument;

/// Default number of shared keywords that makes two records connected.
pub const DEFAULT_MIN_SHARED_KEYWORDS: usize = 2;

/// Default lower bound of the centrality denominator.
pub const DEFAULT_CENTRALITY_FLOOR: usize = 5;

/// Length of hub and related-memory previews.
pub const PREVIEW_LENGTH: usize = 100;

/// Connection graph over a window of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionGraph {
    min_shared_keywords: usize,
    centrality_floor: usize,
}

impl Default for ConnectionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionGraph {
    /// Creates a graph with default thresholds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_shared_keywords: DEFAULT_MIN_SHARED_KEYWORDS,
            centrality_floor: DEFAULT_CENTRALITY_FLOOR,
        }
    }

    /// Sets the shared-keyword threshold (at least 1).
    #[must_use]
    pub fn with_min_shared_keywords(mut self, min: usize) -> Self {
        self.min_shared_keywords = min.max(1);
        self
    }

    /// Sets the centrality denominator floor (at least 1).
    #[must_use]
    pub fn with_centrality_floor(mut self, floor: usize) -> Self {
        self.centrality_floor = floor.max(1);
        self
    }

    /// Returns true if the two records are connected.
    #[must_use]
    pub fn is_connected(&self, a: &MemoryRecord, b: &MemoryRecord) -> bool {
        self.connected(
            a,
            &KeywordSet::from_text(&a.content),
            b,
            &KeywordSet::from_text(&b.content),
        )
    }

    fn connected(
        &self,
        a: &MemoryRecord,
        a_keywords: &KeywordSet,
        b: &MemoryRecord,
        b_keywords: &KeywordSet,
    ) -> bool {
        if a.id == b.id {
            return false;
        }
        a.is_linked_with(b) || a_keywords.shared_with(b_keywords) >= self.min_shared_keywords
    }

    /// Counts the connections of `record` within `window`.
    ///
    /// The record itself is skipped by ID if it appears in the window.
    #[must_use]
    pub fn count_connections(&self, record: &MemoryRecord, window: &[MemoryRecord]) -> usize {
        let keywords = KeywordSet::from_text(&record.content);
        window
            .iter()
            .filter(|other| {
                self.connected(
                    record,
                    &keywords,
                    other,
                    &KeywordSet::from_text(&other.content),
                )
            })
            .count()
    }

    /// Rebuilds connection counts and centrality for every record in the set.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn calculate_centrality(&self, records: &mut [MemoryRecord]) -> GraphStats {
        let keywords: Vec<KeywordSet> = records
            .iter()
            .map(|r| KeywordSet::from_text(&r.content))
            .collect();

        let mut counts = vec![0_usize; records.len()];
        for i in 0..records.len() {
            for j in (i + 1)..records.len() {
                if self.connected(&records[i], &keywords[i], &records[j], &keywords[j]) {
                    counts[i] += 1;
                    counts[j] += 1;
                }
            }
        }

        let max_connections = counts.iter().copied().max().unwrap_or(0);
        let denominator = max_connections.max(self.centrality_floor) as f32;
        for (record, count) in records.iter_mut().zip(&counts) {
            record.connection_count = *count;
            record.graph_centrality = clamp_unit(*count as f32 / denominator);
        }

        let total: usize = counts.iter().sum();
        let stats = GraphStats {
            nodes: records.len(),
            edges: total / 2,
            avg_degree: if records.is_empty() {
                0.0
            } else {
                total as f32 / records.len() as f32
            },
            max_connections,
        };

        tracing::debug!(
            nodes = stats.nodes,
            edges = stats.edges,
            avg_degree = stats.avg_degree,
            "Centrality calculated"
        );
        stats
    }

    /// Returns records whose centrality is at least `min_centrality`.
    ///
    /// Recomputes centrality first. Hubs are ordered by centrality, highest
    /// first; ties keep window order.
    pub fn connection_hubs(
        &self,
        records: &mut [MemoryRecord],
        min_centrality: f32,
    ) -> Vec<ConnectionHub> {
        self.calculate_centrality(records);

        let mut hubs: Vec<ConnectionHub> = records
            .iter()
            .filter(|r| r.graph_centrality >= min_centrality)
            .map(|r| ConnectionHub {
                record_id: r.id.clone(),
                preview: r.preview(PREVIEW_LENGTH),
                connection_count: r.connection_count,
                centrality: r.graph_centrality,
            })
            .collect();
        hubs.sort_by(|a, b| {
            b.centrality
                .partial_cmp(&a.centrality)
                .unwrap_or(Ordering::Equal)
        });
        hubs
    }

    /// Returns records related to `target_id`.
    ///
    /// Explicit links score 1.0 and always pass `min_similarity`; other records
    /// score their keyword similarity with the target and need a non-zero
    /// score. Results are sorted by similarity, highest first. `max_results`
    /// of 0 means unlimited.
    pub fn related(
        &self,
        records: &[MemoryRecord],
        target_id: &RecordId,
        max_results: usize,
        min_similarity: f32,
    ) -> Result<Vec<RelatedMemory>> {
        let target = records
            .iter()
            .find(|r| &r.id == target_id)
            .ok_or_else(|| Error::NotFound {
                operation: "related_memories".to_string(),
                id: target_id.to_string(),
            })?;
        let target_keywords = KeywordSet::from_text(&target.content);

        let mut related: Vec<RelatedMemory> = records
            .iter()
            .filter(|candidate| candidate.id != target.id)
            .filter_map(|candidate| {
                let explicit_link = target.is_linked_with(candidate);
                let similarity = if explicit_link {
                    1.0
                } else {
                    target_keywords.similarity(&KeywordSet::from_text(&candidate.content))
                };
                let keep = explicit_link || (similarity > 0.0 && similarity >= min_similarity);
                keep.then(|| RelatedMemory {
                    record_id: candidate.id.clone(),
                    preview: candidate.preview(PREVIEW_LENGTH),
                    similarity,
                    explicit_link,
                })
            })
            .collect();

        related.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        if max_results > 0 {
            related.truncate(max_results);
        }

        tracing::debug!(
            target = %target_id,
            found = related.len(),
            min_similarity,
            "Related memories found"
        );
        Ok(related)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryType;

    fn record(id: &str, content: &str) -> MemoryRecord {
        MemoryRecord::new("ci", MemoryType::Experience, content, 0.5).with_id(id)
    }

    #[test]
    fn test_shared_keywords_connect() {
        let graph = ConnectionGraph::new();
        let a = record("a", "database migration failed overnight");
        let b = record("b", "database migration succeeded");
        let c = record("c", "database backups rotate weekly");
        assert!(graph.is_connected(&a, &b));
        assert!(!graph.is_connected(&a, &c));
    }

    #[test]
    fn test_explicit_link_connects_without_keywords() {
        let graph = ConnectionGraph::new();
        let a = record("a", "alpha");
        let b = record("b", "omega").with_related_to("a");
        assert!(graph.is_connected(&a, &b));
        assert!(graph.is_connected(&b, &a));
    }

    #[test]
    fn test_self_is_never_connected() {
        let graph = ConnectionGraph::new();
        let a = record("a", "database migration failed");
        assert!(!graph.is_connected(&a, &a.clone()));
        assert_eq!(graph.count_connections(&a, std::slice::from_ref(&a)), 0);
    }

    #[test]
    fn test_count_connections() {
        let graph = ConnectionGraph::new();
        let window = vec![
            record("a", "database migration failed"),
            record("b", "database migration retried"),
            record("c", "lunch break"),
        ];
        assert_eq!(graph.count_connections(&window[0], &window), 1);
        assert_eq!(graph.count_connections(&window[2], &window), 0);
    }

    #[test]
    fn test_centrality_uses_floor_for_sparse_sets() {
        let graph = ConnectionGraph::new();
        let mut records = vec![
            record("a", "database migration failed"),
            record("b", "database migration retried"),
            record("c", "lunch break"),
        ];
        let stats = graph.calculate_centrality(&mut records);

        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.max_connections, 1);
        assert!((records[0].graph_centrality - 0.2).abs() < 1e-6);
        assert!(records[2].graph_centrality.abs() < f32::EPSILON);
    }

    #[test]
    fn test_centrality_normalizes_by_max_in_dense_sets() {
        let graph = ConnectionGraph::new();
        let mut records: Vec<MemoryRecord> = (0..7)
            .map(|i| record(&format!("r{i}"), "shared keyword cluster content"))
            .collect();
        let stats = graph.calculate_centrality(&mut records);

        assert_eq!(stats.max_connections, 6);
        assert_eq!(stats.edges, 21);
        assert!(
            records
                .iter()
                .all(|r| (r.graph_centrality - 1.0).abs() < f32::EPSILON)
        );
    }

    #[test]
    fn test_empty_set() {
        let stats = ConnectionGraph::new().calculate_centrality(&mut []);
        assert_eq!(stats, GraphStats::default());
    }

    #[test]
    fn test_connection_hubs_sorted() {
        let graph = ConnectionGraph::new();
        let mut records = vec![
            record("lonely", "lunch break"),
            record("a", "database migration failed"),
            record("b", "database migration retried"),
        ];
        let hubs = graph.connection_hubs(&mut records, 0.1);
        assert_eq!(hubs.len(), 2);
        assert!(hubs.iter().all(|h| h.connection_count == 1));
    }

    #[test]
    fn test_related_explicit_link_first() {
        let graph = ConnectionGraph::new();
        let records = vec![
            record("t", "database migration failed overnight"),
            record("sim", "database migration failed again"),
            record("link", "unrelated words entirely").with_related_to("t"),
            record("none", "lunch break"),
        ];
        let related = graph.related(&records, &RecordId::new("t"), 0, 0.0).unwrap();

        assert_eq!(related.len(), 2);
        assert_eq!(related[0].record_id.as_str(), "link");
        assert!(related[0].explicit_link);
        assert_eq!(related[1].record_id.as_str(), "sim");
        assert!((related[1].similarity - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_related_limit_and_threshold() {
        let graph = ConnectionGraph::new();
        let records = vec![
            record("t", "database migration failed overnight"),
            record("high", "database migration failed overnight again"),
            record("low", "database"),
        ];
        let related = graph
            .related(&records, &RecordId::new("t"), 1, 0.5)
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].record_id.as_str(), "high");
    }

    #[test]
    fn test_related_missing_target() {
        let graph = ConnectionGraph::new();
        let err = graph
            .related(&[], &RecordId::new("missing"), 0, 0.0)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
