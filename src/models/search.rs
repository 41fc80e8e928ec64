//! Record store query filters.

use super::{MemoryRecord, MemoryType, Tier};

/// Filter criteria for record store queries.
///
/// All set criteria must match. A `limit` of `None` returns every match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryQuery {
    /// Owning agent.
    pub agent_id: String,
    /// Minimum creation timestamp (inclusive).
    pub start_time: Option<u64>,
    /// Maximum creation timestamp (inclusive).
    pub end_time: Option<u64>,
    /// Memory type filter.
    pub memory_type: Option<MemoryType>,
    /// Minimum importance.
    pub min_importance: Option<f32>,
    /// Tier filter.
    pub tier: Option<Tier>,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
}

impl MemoryQuery {
    /// Creates a query matching every record of an agent.
    #[must_use]
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    /// Restricts to records created in `start..=end`.
    #[must_use]
    pub const fn with_time_range(mut self, start: u64, end: u64) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Restricts to records created at or after `start`.
    #[must_use]
    pub const fn since(mut self, start: u64) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Restricts to a memory type.
    #[must_use]
    pub const fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    /// Sets a minimum importance.
    #[must_use]
    pub const fn with_min_importance(mut self, importance: f32) -> Self {
        self.min_importance = Some(importance);
        self
    }

    /// Restricts to a tier.
    #[must_use]
    pub const fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `record` satisfies every criterion except `limit`.
    #[must_use]
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        record.agent_id == self.agent_id
            && self.start_time.is_none_or(|start| record.timestamp >= start)
            && self.end_time.is_none_or(|end| record.timestamp <= end)
            && self.memory_type.is_none_or(|t| record.memory_type == t)
            && self
                .min_importance
                .is_none_or(|min| record.importance >= min)
            && self.tier.is_none_or(|tier| record.tier == tier)
    }
}
