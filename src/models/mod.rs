//! Data models for katra.
//!
//! This module contains the core data structures shared by the store and the
//! consolidation services.

mod consolidation;
mod domain;
pub mod graph;
mod memory;
mod search;

pub use consolidation::{ConsolidationMode, ConsolidationStats, MemoryPathway, MemoryStrength};
pub use domain::{MemoryType, Tier};
pub use graph::{ConnectionHub, GraphStats, RelatedMemory};
pub use memory::{Experience, MemoryRecord, RecordAnnotation, RecordId, preview};
pub(crate) use memory::clamp_unit;
pub use search::MemoryQuery;
