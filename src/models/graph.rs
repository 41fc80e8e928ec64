//! Connection graph projections.
//!
//! These are read-only views derived from a window of records; none of them
//! are persisted.
//!
//! | Type | Description |
//! |------|-------------|
//! | `GraphStats` | Aggregate node/edge counts of one centrality pass |
//! | `ConnectionHub` | A record whose centrality clears a threshold |
//! | `RelatedMemory` | A record connected to a target record |

use super::RecordId;
use serde::{Deserialize, Serialize};

/// Aggregate results of a centrality pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Records in the window.
    pub nodes: usize,
    /// Undirected connections (sum of connection counts / 2).
    pub edges: usize,
    /// Average connections per record.
    pub avg_degree: f32,
    /// Largest connection count seen.
    pub max_connections: usize,
}

/// A highly connected record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHub {
    /// Record ID.
    pub record_id: RecordId,
    /// Content preview.
    pub preview: String,
    /// Connections within the window.
    pub connection_count: usize,
    /// Normalized centrality.
    pub centrality: f32,
}

/// A record connected to a lookup target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedMemory {
    /// Record ID.
    pub record_id: RecordId,
    /// Content preview.
    pub preview: String,
    /// Keyword similarity to the target, 1.0 for explicit links.
    pub similarity: f32,
    /// Whether the two records are explicitly linked.
    pub explicit_link: bool,
}
