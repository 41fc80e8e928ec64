//! Memory records and identifiers.

use super::{MemoryType, Tier};
use crate::current_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a memory record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh ID of the form `{agent}_{unix_secs}_{suffix}`.
    #[must_use]
    pub fn generate(agent_id: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "{agent_id}_{}_{}",
            current_timestamp(),
            &suffix[..8]
        ))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A persisted unit of agent experience.
///
/// Graph and pattern fields start zeroed and are filled in by the
/// consolidation passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier.
    pub id: RecordId,
    /// Owning agent.
    pub agent_id: String,
    /// Session the record was captured in.
    pub session_id: Option<String>,
    /// The memory content.
    pub content: String,
    /// Optional response that accompanied the content.
    pub response: Option<String>,
    /// Optional free-form context.
    pub context: Option<String>,
    /// Kind of memory.
    pub memory_type: MemoryType,
    /// Storage tier.
    pub tier: Tier,
    /// Importance (0.0 to 1.0).
    pub importance: f32,
    /// Whether the agent explicitly flagged this record as important.
    pub marked_important: bool,
    /// Creation timestamp (Unix epoch seconds).
    pub timestamp: u64,
    /// Last access timestamp (Unix epoch seconds).
    pub last_accessed: u64,
    /// Number of times the record was accessed.
    pub access_count: u32,
    /// Connections within the last analysed window.
    pub connection_count: usize,
    /// Normalized connection centrality (0.0 to 1.0).
    pub graph_centrality: f32,
    /// Pattern this record belongs to, if any.
    pub pattern_id: Option<String>,
    /// Size of the pattern this record belongs to.
    pub pattern_frequency: usize,
    /// Similarity to the pattern seed.
    pub semantic_similarity: f32,
    /// Whether this record is preserved as a representative of its pattern.
    pub is_pattern_outlier: bool,
    /// Pattern summary, set on outliers.
    pub pattern_summary: Option<String>,
    /// Explicit link to another record.
    pub related_to: Option<RecordId>,
    /// Whether the record has been archived.
    pub archived: bool,
    /// Whether the record only lives for the current session.
    pub session_scoped: bool,
}

impl MemoryRecord {
    /// Creates a tier-1 record with a fresh ID and the current timestamp.
    ///
    /// Importance is clamped to 0.0..=1.0.
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        memory_type: MemoryType,
        content: impl Into<String>,
        importance: f32,
    ) -> Self {
        let agent_id = agent_id.into();
        let now = current_timestamp();
        Self {
            id: RecordId::generate(&agent_id),
            agent_id,
            session_id: None,
            content: content.into(),
            response: None,
            context: None,
            memory_type,
            tier: Tier::Raw,
            importance: clamp_unit(importance),
            marked_important: false,
            timestamp: now,
            last_accessed: now,
            access_count: 0,
            connection_count: 0,
            graph_centrality: 0.0,
            pattern_id: None,
            pattern_frequency: 0,
            semantic_similarity: 0.0,
            is_pattern_outlier: false,
            pattern_summary: None,
            related_to: None,
            archived: false,
            session_scoped: false,
        }
    }

    /// Replaces the generated ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the creation (and last access) timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self.last_accessed = timestamp;
        self
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the accompanying response.
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Sets the free-form context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Links this record to another record.
    #[must_use]
    pub fn with_related_to(mut self, other: impl Into<RecordId>) -> Self {
        self.related_to = Some(other.into());
        self
    }

    /// Sets the storage tier.
    #[must_use]
    pub const fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Flags the record as explicitly important.
    #[must_use]
    pub const fn marked_important(mut self, marked: bool) -> Self {
        self.marked_important = marked;
        self
    }

    /// Returns true if either record explicitly links to the other.
    #[must_use]
    pub fn is_linked_with(&self, other: &Self) -> bool {
        self.related_to.as_ref() == Some(&other.id) || other.related_to.as_ref() == Some(&self.id)
    }

    /// Returns the graph and pattern annotations carried by this record.
    #[must_use]
    pub fn annotation(&self) -> RecordAnnotation {
        RecordAnnotation {
            connection_count: self.connection_count,
            graph_centrality: self.graph_centrality,
            pattern_id: self.pattern_id.clone(),
            pattern_frequency: self.pattern_frequency,
            semantic_similarity: self.semantic_similarity,
            is_pattern_outlier: self.is_pattern_outlier,
            pattern_summary: self.pattern_summary.clone(),
        }
    }

    /// Returns a preview of the content truncated to `max_chars`.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        preview(&self.content, max_chars)
    }
}

/// Graph and pattern fields written back by consolidation passes.
///
/// Stores apply these under their own lock so an advisory pass never
/// overwrites fields it did not compute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordAnnotation {
    /// Connections within the analysed window.
    pub connection_count: usize,
    /// Normalized centrality.
    pub graph_centrality: f32,
    /// Pattern membership.
    pub pattern_id: Option<String>,
    /// Pattern size.
    pub pattern_frequency: usize,
    /// Similarity to the pattern seed.
    pub semantic_similarity: f32,
    /// Outlier flag.
    pub is_pattern_outlier: bool,
    /// Pattern summary.
    pub pattern_summary: Option<String>,
}

impl RecordAnnotation {
    /// Copies the annotation onto a record.
    pub fn apply_to(&self, record: &mut MemoryRecord) {
        record.connection_count = self.connection_count;
        record.graph_centrality = self.graph_centrality;
        record.pattern_id.clone_from(&self.pattern_id);
        record.pattern_frequency = self.pattern_frequency;
        record.semantic_similarity = self.semantic_similarity;
        record.is_pattern_outlier = self.is_pattern_outlier;
        record.pattern_summary.clone_from(&self.pattern_summary);
    }
}

/// An experience held by working memory.
///
/// Owned by exactly one buffer item. Eviction hands the record to the store
/// and drops the experience.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    /// The underlying record.
    pub record: MemoryRecord,
}

impl Experience {
    /// Wraps a record.
    #[must_use]
    pub const fn new(record: MemoryRecord) -> Self {
        Self { record }
    }
}

impl From<MemoryRecord> for Experience {
    fn from(record: MemoryRecord) -> Self {
        Self::new(record)
    }
}

/// Truncates `text` to at most `max_chars` characters, appending `...` when cut.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(cut).collect();
    out.push_str("...");
    out
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_generate_format() {
        let id = RecordId::generate("ci-alpha");
        let parts: Vec<&str> = id.as_str().rsplitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert!(parts[1].parse::<u64>().is_ok());
        assert_eq!(parts[2], "ci-alpha");
    }

    #[test]
    fn test_record_ids_are_unique() {
        assert_ne!(RecordId::generate("a"), RecordId::generate("a"));
    }

    #[test]
    fn test_new_record_defaults() {
        let record = MemoryRecord::new("ci", MemoryType::Knowledge, "fact", 1.7);
        assert!((record.importance - 1.0).abs() < f32::EPSILON);
        assert_eq!(record.tier, Tier::Raw);
        assert!(record.pattern_id.is_none());
        assert_eq!(record.connection_count, 0);
        assert!(!record.archived);
        assert_eq!(record.timestamp, record.last_accessed);
    }

    #[test]
    fn test_nan_importance_clamps_to_zero() {
        let record = MemoryRecord::new("ci", MemoryType::Experience, "x", f32::NAN);
        assert!(record.importance.abs() < f32::EPSILON);
    }

    #[test]
    fn test_is_linked_with_either_direction() {
        let a = MemoryRecord::new("ci", MemoryType::Experience, "a", 0.5).with_id("a");
        let b = MemoryRecord::new("ci", MemoryType::Experience, "b", 0.5)
            .with_id("b")
            .with_related_to("a");
        assert!(a.is_linked_with(&b));
        assert!(b.is_linked_with(&a));
    }

    #[test]
    fn test_annotation_apply() {
        let mut record = MemoryRecord::new("ci", MemoryType::Experience, "x", 0.5);
        let annotation = RecordAnnotation {
            connection_count: 4,
            graph_centrality: 0.8,
            pattern_id: Some("pattern_x_1".to_string()),
            pattern_frequency: 3,
            semantic_similarity: 0.5,
            is_pattern_outlier: true,
            pattern_summary: Some("Pattern".to_string()),
        };
        annotation.apply_to(&mut record);
        assert_eq!(record.annotation(), annotation);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghijkl", 10), "abcdefg...");
        assert_eq!(preview("ééééééé", 5), "éé...");
    }
}
