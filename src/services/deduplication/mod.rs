//! Duplicate detection before a record is admitted.
//!
//! Two checks, evaluated in order with short-circuit:
//! 1. **Exact match**: normalized SHA256 comparison against the agent's
//!    records inside the recency window (5 minutes by default)
//! 2. **Similarity**: positional character overlap against a bounded set of
//!    the agent's records, only when the caller passes a threshold above zero
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             DeduplicationService             │
//! │  ┌──────────────────┐  ┌──────────────────┐  │
//! │  │ ExactMatch       │  │ Similarity       │  │
//! │  │ Checker          │  │ Checker          │  │
//! │  │                  │  │                  │  │
//! │  │ SHA256, windowed │  │ char overlap     │  │
//! │  └──────────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Detection is best-effort. A store failure inside one check is logged and
//! that check is skipped.

mod config;
mod exact_match;
mod hasher;
mod semantic;
mod service;
mod types;

pub use config::DeduplicationConfig;
pub use exact_match::ExactMatchChecker;
pub use hasher::ContentHasher;
pub use semantic::{SemanticSimilarityChecker, char_overlap_similarity};
pub use service::DeduplicationService;
pub use types::{DuplicateCheckResult, DuplicateReason};
