//! Memory type and tier classifications.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of experience a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Something that happened during a session.
    #[default]
    Experience,
    /// A learned fact.
    Knowledge,
    /// The agent's own reflection on earlier work.
    Reflection,
    /// A recurring pattern distilled from several experiences.
    Pattern,
    /// An objective the agent is pursuing.
    Goal,
    /// A decision and its rationale.
    Decision,
}

impl MemoryType {
    /// Returns all memory type variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Experience,
            Self::Knowledge,
            Self::Reflection,
            Self::Pattern,
            Self::Goal,
            Self::Decision,
        ]
    }

    /// Returns the memory type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Experience => "experience",
            Self::Knowledge => "knowledge",
            Self::Reflection => "reflection",
            Self::Pattern => "pattern",
            Self::Goal => "goal",
            Self::Decision => "decision",
        }
    }

    /// Parses a memory type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "experience" => Some(Self::Experience),
            "knowledge" => Some(Self::Knowledge),
            "reflection" => Some(Self::Reflection),
            "pattern" => Some(Self::Pattern),
            "goal" => Some(Self::Goal),
            "decision" => Some(Self::Decision),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage tier of a record.
///
/// New records land in [`Tier::Raw`]; later tiers hold compressed forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Tier 1: verbatim records.
    #[default]
    Raw,
    /// Tier 2: digests.
    Digest,
    /// Tier 3: long-term summaries.
    Summary,
}

impl Tier {
    /// Returns the tier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Digest => "digest",
            Self::Summary => "summary",
        }
    }

    /// Returns the numeric tier level (1 to 3).
    #[must_use]
    pub const fn level(&self) -> u8 {
        match self {
            Self::Raw => 1,
            Self::Digest => 2,
            Self::Summary => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
