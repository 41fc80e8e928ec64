//! Business logic services.
//!
//! Services operate on records owned by the shared [`RecordStore`](crate::storage::RecordStore)
//! and are wired together by the [`ServiceContainer`].

pub mod consent;
pub mod consolidation;
mod container;
pub mod deduplication;
pub mod graph;
pub mod keywords;
pub mod patterns;
mod related;
pub mod working_memory;

pub use consent::ConsentGate;
pub use consolidation::{
    BackgroundConsolidator, ConsolidationConfig, ConsolidationService, ConversationAnalyzer,
    MemoryCandidate,
};
pub use container::ServiceContainer;
pub use deduplication::{DeduplicationService, DuplicateCheckResult};
pub use graph::ConnectionGraph;
pub use keywords::{KeywordSet, extract_keywords, keyword_similarity};
pub use patterns::{DetectedPattern, PatternDetector};
pub use related::{DEFAULT_QUERY_LIMIT, GraphQueryService};
pub use working_memory::{WorkingMemoryBuffer, WorkingMemoryConfig, WorkingMemoryStats};
