//! Pattern detection over a window of records.
//!
//! Repeated experiences ("debugged the flaky test again") collapse into a
//! pattern: every member shares a pattern ID and frequency, and three
//! representatives are kept as outliers: the earliest, the latest and the most
//! important member. The rest are candidates for archival.

use crate::models::{MemoryRecord, RecordId};
use crate::services::keywords::KeywordSet;
use tracing::instrument;

/// Default similarity to the seed required to join a pattern.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.4;

/// Default minimum number of members of a pattern.
pub const DEFAULT_MIN_PATTERN_SIZE: usize = 3;

/// Pattern size above which a warning is logged.
pub const SOFT_MEMBER_LIMIT: usize = 256;

/// A pattern found by [`PatternDetector::detect_patterns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPattern {
    /// Shared pattern ID.
    pub pattern_id: String,
    /// Member record IDs in scan order.
    pub members: Vec<RecordId>,
    /// Distinct outlier record IDs.
    pub outliers: Vec<RecordId>,
}

impl DetectedPattern {
    /// Number of members that are not outliers.
    #[must_use]
    pub fn archived_count(&self) -> usize {
        self.members.len() - self.outliers.len()
    }
}

/// Clusters similar records around a seed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternDetector {
    similarity_threshold: f32,
    min_pattern_size: usize,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    /// Creates a detector with default thresholds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_pattern_size: DEFAULT_MIN_PATTERN_SIZE,
        }
    }

    /// Sets the similarity threshold (clamped to 0.0..=1.0).
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = crate::models::clamp_unit(threshold);
        self
    }

    /// Sets the minimum pattern size (at least [`DEFAULT_MIN_PATTERN_SIZE`]).
    #[must_use]
    pub fn with_min_pattern_size(mut self, size: usize) -> Self {
        self.min_pattern_size = size.max(DEFAULT_MIN_PATTERN_SIZE);
        self
    }

    /// Finds patterns and annotates their members in place.
    ///
    /// Pattern fields of every record are reset first, so each pass starts
    /// from an unassigned window. Members are compared only against the seed.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn detect_patterns(&self, records: &mut [MemoryRecord]) -> Vec<DetectedPattern> {
        for record in records.iter_mut() {
            clear_pattern(record);
        }

        let keywords: Vec<KeywordSet> = records
            .iter()
            .map(|r| KeywordSet::from_text(&r.content))
            .collect();
        let mut assigned = vec![false; records.len()];
        let mut patterns = Vec::new();

        for seed in 0..records.len() {
            if assigned[seed] {
                continue;
            }

            let mut members: Vec<(usize, f32)> = vec![(seed, 1.0)];
            for candidate in (seed + 1)..records.len() {
                if assigned[candidate] {
                    continue;
                }
                let similarity = keywords[seed].similarity(&keywords[candidate]);
                if similarity >= self.similarity_threshold {
                    members.push((candidate, similarity));
                }
            }

            if members.len() < self.min_pattern_size {
                continue;
            }
            if members.len() > SOFT_MEMBER_LIMIT {
                tracing::warn!(
                    seed = %records[seed].id,
                    members = members.len(),
                    "Pattern exceeds soft member limit"
                );
            }

            for (index, _) in &members {
                assigned[*index] = true;
            }
            patterns.push(annotate_pattern(records, &members));
        }

        tracing::debug!(patterns = patterns.len(), "Pattern detection complete");
        metrics::counter!("consolidation_patterns_detected_total")
            .increment(patterns.len() as u64);
        patterns
    }

    /// Returns the records to archive.
    ///
    /// Non-pattern records and non-outlier pattern members are kept; outliers
    /// are dropped from the archival set.
    #[must_use]
    pub fn filter_for_archival(records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
        records
            .into_iter()
            .filter(|record| {
                if record.is_pattern_outlier {
                    tracing::debug!(
                        id = %record.id,
                        pattern = record.pattern_id.as_deref().unwrap_or_default(),
                        "Preserving pattern outlier"
                    );
                    return false;
                }
                true
            })
            .collect()
    }
}

fn clear_pattern(record: &mut MemoryRecord) {
    record.pattern_id = None;
    record.pattern_frequency = 0;
    record.semantic_similarity = 0.0;
    record.is_pattern_outlier = false;
    record.pattern_summary = None;
}

fn annotate_pattern(records: &mut [MemoryRecord], members: &[(usize, f32)]) -> DetectedPattern {
    let seed = &records[members[0].0];
    let pattern_id = format!("pattern_{}_{}", seed.id, seed.timestamp);

    let outlier_indices = select_outliers(records, members);
    let preserved = outlier_indices.len();
    let summary = format!(
        "Pattern: {} occurrences ({} archived, {} preserved as outliers)",
        members.len(),
        members.len() - preserved,
        preserved
    );

    for (index, similarity) in members {
        let record = &mut records[*index];
        record.pattern_id = Some(pattern_id.clone());
        record.pattern_frequency = members.len();
        record.semantic_similarity = *similarity;
        if outlier_indices.contains(index) {
            record.is_pattern_outlier = true;
            record.pattern_summary = Some(summary.clone());
        }
    }

    tracing::debug!(pattern = %pattern_id, members = members.len(), "Detected pattern");

    DetectedPattern {
        pattern_id,
        members: members.iter().map(|(i, _)| records[*i].id.clone()).collect(),
        outliers: members
            .iter()
            .filter(|(i, _)| outlier_indices.contains(i))
            .map(|(i, _)| records[*i].id.clone())
            .collect(),
    }
}

/// Earliest (first on ties), latest (last on ties) and most important (first
/// on ties) member, deduplicated.
fn select_outliers(records: &[MemoryRecord], members: &[(usize, f32)]) -> Vec<usize> {
    let mut earliest = members[0].0;
    let mut latest = members[0].0;
    let mut most_important = members[0].0;

    for (index, _) in members.iter().skip(1) {
        let record = &records[*index];
        if record.timestamp < records[earliest].timestamp {
            earliest = *index;
        }
        if record.timestamp >= records[latest].timestamp {
            latest = *index;
        }
        if record.importance > records[most_important].importance {
            most_important = *index;
        }
    }

    let mut outliers = vec![earliest];
    for index in [latest, most_important] {
        if !outliers.contains(&index) {
            outliers.push(index);
        }
    }
    outliers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryType;

    fn record(id: &str, content: &str, importance: f32, timestamp: u64) -> MemoryRecord {
        MemoryRecord::new("ci", MemoryType::Experience, content, importance)
            .with_id(id)
            .with_timestamp(timestamp)
    }

    fn debugging_window() -> Vec<MemoryRecord> {
        vec![
            record("r0", "debugging flaky integration test timeout", 0.3, 100),
            record("r1", "debugging flaky integration test again", 0.9, 200),
            record("r2", "debugging flaky integration test retries", 0.4, 300),
            record("r3", "lunch with the team downtown", 0.5, 400),
            record("r4", "reading about category theory", 0.5, 500),
        ]
    }

    #[test]
    fn test_detects_single_pattern() {
        let mut records = debugging_window();
        let patterns = PatternDetector::new().detect_patterns(&mut records);

        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.pattern_id, "pattern_r0_100");
        assert_eq!(pattern.members.len(), 3);
        assert_eq!(
            pattern.outliers,
            vec![RecordId::new("r0"), RecordId::new("r1"), RecordId::new("r2")]
        );

        for record in &records[..3] {
            assert_eq!(record.pattern_frequency, 3);
            assert!(record.is_pattern_outlier);
            assert_eq!(
                record.pattern_summary.as_deref(),
                Some("Pattern: 3 occurrences (0 archived, 3 preserved as outliers)")
            );
        }
        assert!((records[0].semantic_similarity - 1.0).abs() < f32::EPSILON);
        assert!(records[3].pattern_id.is_none());
        assert!(records[4].pattern_id.is_none());
    }

    #[test]
    fn test_coinciding_outliers_are_deduplicated() {
        let mut records = vec![
            record("a", "deploy pipeline failed checksum", 0.2, 100),
            record("b", "deploy pipeline failed checksum", 0.1, 200),
            record("c", "deploy pipeline failed checksum", 0.1, 300),
            record("d", "deploy pipeline failed checksum", 0.9, 400),
        ];
        let patterns = PatternDetector::new().detect_patterns(&mut records);

        assert_eq!(patterns[0].outliers.len(), 2);
        assert_eq!(patterns[0].archived_count(), 2);
        assert!(records[0].is_pattern_outlier);
        assert!(records[3].is_pattern_outlier);
        assert!(!records[1].is_pattern_outlier);
        assert_eq!(
            records[0].pattern_summary.as_deref(),
            Some("Pattern: 4 occurrences (2 archived, 2 preserved as outliers)")
        );
        assert!(records[1].pattern_summary.is_none());
    }

    #[test]
    fn test_timestamp_ties_resolve_to_scan_order() {
        let mut records = vec![
            record("a", "deploy pipeline failed checksum", 0.5, 100),
            record("b", "deploy pipeline failed checksum", 0.5, 100),
            record("c", "deploy pipeline failed checksum", 0.5, 100),
            record("d", "deploy pipeline failed checksum", 0.5, 100),
        ];
        let patterns = PatternDetector::new().detect_patterns(&mut records);
        assert_eq!(
            patterns[0].outliers,
            vec![RecordId::new("a"), RecordId::new("d")]
        );
    }

    #[test]
    fn test_too_few_members_is_no_pattern() {
        let mut records = vec![
            record("a", "deploy pipeline failed checksum", 0.5, 100),
            record("b", "deploy pipeline failed checksum", 0.5, 200),
        ];
        assert!(PatternDetector::new().detect_patterns(&mut records).is_empty());
        assert!(records.iter().all(|r| r.pattern_id.is_none()));
    }

    #[test]
    fn test_min_pattern_size_never_drops_below_three() {
        let detector = PatternDetector::new().with_min_pattern_size(2);
        assert_eq!(detector, PatternDetector::new());

        let mut records = vec![
            record("a", "deploy pipeline failed checksum", 0.5, 100),
            record("b", "deploy pipeline failed checksum", 0.5, 200),
        ];
        assert!(detector.detect_patterns(&mut records).is_empty());
        assert!(
            records
                .iter()
                .all(|r| r.pattern_id.is_none() || r.pattern_frequency >= 3)
        );
    }

    #[test]
    fn test_rerun_resets_previous_annotations() {
        let mut records = debugging_window();
        let detector = PatternDetector::new();
        detector.detect_patterns(&mut records);
        let patterns = detector.detect_patterns(&mut records);
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn test_filter_for_archival_drops_outliers() {
        let mut records = vec![
            record("a", "deploy pipeline failed checksum", 0.2, 100),
            record("b", "deploy pipeline failed checksum", 0.1, 200),
            record("c", "deploy pipeline failed checksum", 0.1, 300),
            record("d", "deploy pipeline failed checksum", 0.9, 400),
            record("e", "unrelated gardening notes", 0.5, 500),
        ];
        PatternDetector::new().detect_patterns(&mut records);
        let archival = PatternDetector::filter_for_archival(records);

        let ids: Vec<&str> = archival.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "e"]);
    }
}
