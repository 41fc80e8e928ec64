//! Memory strength classification.

use crate::models::{MemoryRecord, MemoryStrength};
use serde::{Deserialize, Serialize};

/// Bonus for records the agent flagged as important.
const MARKED_IMPORTANT_BONUS: f32 = 0.2;
/// Bonus for well-connected records.
const CENTRALITY_BONUS: f32 = 0.1;
/// Centrality at which the bonus applies.
const CENTRALITY_BONUS_MIN: f32 = 0.5;
/// Bonus for frequently accessed records.
const ACCESS_BONUS: f32 = 0.1;
/// Access count above which the bonus applies.
const ACCESS_BONUS_MIN: u32 = 5;

/// Score cut-offs for [`MemoryStrength`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthThresholds {
    /// Minimum score for HIGH.
    pub high: f32,
    /// Minimum score for MEDIUM.
    pub medium: f32,
}

impl Default for StrengthThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.4,
        }
    }
}

impl StrengthThresholds {
    /// Classifies a record.
    ///
    /// ```rust
    /// use katra::services::consolidation::StrengthThresholds;
    /// use katra::{MemoryRecord, MemoryStrength, MemoryType};
    ///
    /// let thresholds = StrengthThresholds::default();
    /// let record = MemoryRecord::new("ci", MemoryType::Decision, "Pin the toolchain", 0.65)
    ///     .marked_important(true);
    /// assert_eq!(thresholds.classify(&record), MemoryStrength::High);
    /// ```
    #[must_use]
    pub fn classify(&self, record: &MemoryRecord) -> MemoryStrength {
        let score = strength_score(record);
        if score >= self.high {
            MemoryStrength::High
        } else if score >= self.medium {
            MemoryStrength::Medium
        } else {
            MemoryStrength::Low
        }
    }
}

/// Importance plus bonuses for explicit marking, centrality and access, capped at 1.0.
#[must_use]
pub fn strength_score(record: &MemoryRecord) -> f32 {
    let mut score = record.importance;
    if record.marked_important {
        score += MARKED_IMPORTANT_BONUS;
    }
    if record.graph_centrality >= CENTRALITY_BONUS_MIN {
        score += CENTRALITY_BONUS;
    }
    if record.access_count > ACCESS_BONUS_MIN {
        score += ACCESS_BONUS;
    }
    score.min(1.0)
}
