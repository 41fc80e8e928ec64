//! Consolidation modes, strengths and statistics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Consolidation mode of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsolidationMode {
    /// Active capture.
    #[default]
    Wake,
    /// Offline consolidation.
    Sleep,
}

impl ConsolidationMode {
    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wake => "WAKE",
            Self::Sleep => "SLEEP",
        }
    }
}

impl fmt::Display for ConsolidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strength class of a memory, deciding how SLEEP treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStrength {
    /// Candidate for archival or gist extraction.
    Low,
    /// Candidate for summarization.
    Medium,
    /// Preserved as-is.
    High,
}

impl MemoryStrength {
    /// Returns the strength as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for MemoryStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a memory was formed during WAKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPathway {
    /// Explicitly stored by the agent.
    Conscious,
    /// Extracted automatically from conversation.
    Subconscious,
}

impl MemoryPathway {
    /// Returns the pathway as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Conscious => "conscious",
            Self::Subconscious => "subconscious",
        }
    }
}

impl fmt::Display for MemoryPathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Running statistics of one WAKE/SLEEP cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationStats {
    /// Records captured during WAKE.
    pub memories_captured: usize,
    /// Captures through the conscious pathway.
    pub conscious_formations: usize,
    /// Captures through the subconscious pathway.
    pub subconscious_formations: usize,
    /// Candidates the analyzer reported as converged.
    pub convergences: usize,
    /// Records routed during SLEEP.
    pub memories_processed: usize,
    /// HIGH strength records.
    pub high_strength_preserved: usize,
    /// MEDIUM strength records.
    pub medium_strength_summarized: usize,
    /// LOW strength records.
    pub low_strength_archived: usize,
    /// Patterns found by the pattern pass.
    pub patterns_extracted: usize,
    /// Records whose centrality was recomputed.
    pub centrality_updates: usize,
    /// Nodes in the last graph pass.
    pub graph_nodes: usize,
    /// Undirected edges in the last graph pass.
    pub graph_edges: usize,
    /// Average degree in the last graph pass.
    pub avg_degree: f32,
    /// Start of the current WAKE period (Unix epoch seconds).
    pub wake_started: u64,
    /// Start of SLEEP, 0 if not sleeping.
    pub sleep_started: u64,
    /// End of the last SLEEP.
    pub sleep_completed: u64,
    /// Duration of the last SLEEP in seconds.
    pub consolidation_duration: u64,
}

impl ConsolidationStats {
    /// Returns true if nothing was captured or processed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.memories_captured == 0
            && self.memories_processed == 0
            && self.patterns_extracted == 0
            && self.centrality_updates == 0
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            "No memories to consolidate".to_string()
        } else {
            format!(
                "Captured: {} (conscious {}, subconscious {}), Processed: {}, High: {}, Medium: {}, Low: {}, Patterns: {}",
                self.memories_captured,
                self.conscious_formations,
                self.subconscious_formations,
                self.memories_processed,
                self.high_strength_preserved,
                self.medium_strength_summarized,
                self.low_strength_archived,
                self.patterns_extracted
            )
        }
    }

    /// Clears the per-cycle WAKE counters.
    pub(crate) const fn reset_wake_counters(&mut self, wake_started: u64) {
        self.memories_captured = 0;
        self.conscious_formations = 0;
        self.subconscious_formations = 0;
        self.convergences = 0;
        self.wake_started = wake_started;
    }

    /// Clears the per-cycle SLEEP counters.
    pub(crate) const fn reset_sleep_counters(&mut self) {
        self.memories_processed = 0;
        self.high_strength_preserved = 0;
        self.medium_strength_summarized = 0;
        self.low_strength_archived = 0;
        self.patterns_extracted = 0;
        self.centrality_updates = 0;
        self.graph_nodes = 0;
        self.graph_edges = 0;
        self.avg_degree = 0.0;
        self.sleep_started = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_ordering() {
        assert!(MemoryStrength::High > MemoryStrength::Medium);
        assert!(MemoryStrength::Medium > MemoryStrength::Low);
    }

    #[test]
    fn test_stats_summary() {
        let empty = ConsolidationStats::default();
        assert!(empty.is_empty());
        assert_eq!(empty.summary(), "No memories to consolidate");

        let stats = ConsolidationStats {
            memories_captured: 3,
            conscious_formations: 2,
            subconscious_formations: 1,
            memories_processed: 3,
            high_strength_preserved: 1,
            low_strength_archived: 2,
            ..ConsolidationStats::default()
        };
        assert!(stats.summary().contains("Captured: 3"));
        assert!(stats.summary().contains("Low: 2"));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(ConsolidationMode::default().to_string(), "WAKE");
        assert_eq!(ConsolidationMode::Sleep.to_string(), "SLEEP");
    }
}
