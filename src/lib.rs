//! # Katra
//!
//! Memory consolidation engine for long-running AI agents.
//!
//! Katra decides what a CI keeps from its experience: whether a transient
//! memory is preserved verbatim, summarized, linked into the connection graph,
//! or let go. It also bounds an agent's live attention with a small
//! working-memory buffer that spills into the record store under pressure.
//!
//! ## Components
//!
//! - Working memory buffer with attention-weighted eviction
//! - Keyword extraction and a keyword-similarity connection graph
//! - Pattern detection with outlier preservation
//! - Exact and heuristic duplicate detection
//! - WAKE/SLEEP consolidation state machine
//! - Per-agent consent gate
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use katra::services::ServiceContainer;
//! use katra::storage::InMemoryRecordStore;
//! use katra::{Experience, KatraConfig, MemoryRecord, MemoryType};
//!
//! let store = Arc::new(InMemoryRecordStore::new());
//! let services = ServiceContainer::new(KatraConfig::default(), store);
//!
//! let mut buffer = services.working_memory("ci-alpha");
//! let record = MemoryRecord::new("ci-alpha", MemoryType::Experience, "Reviewed the build logs", 0.6);
//! buffer.add(Experience::new(record), 0.7)?;
//! assert_eq!(buffer.len(), 1);
//! # Ok::<(), katra::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::KatraConfig;
pub use models::{
    ConsolidationMode, ConsolidationStats, Experience, MemoryPathway, MemoryQuery, MemoryRecord,
    MemoryStrength, MemoryType, RecordId, Tier,
};
pub use services::{
    ConsentGate, ConsolidationService, DeduplicationService, ServiceContainer,
    WorkingMemoryBuffer,
};
pub use storage::{InMemoryRecordStore, RecordStore};

/// Error type for katra operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty content or agent id, out-of-range buffer index |
/// | `InvalidState` | WAKE-only call during SLEEP, missing consent context |
/// | `NotFound` | Related-memory lookup for an unknown record |
/// | `ResourceLimit` | Background bulkhead is full in fail-fast mode |
/// | `ConsentRequired` | One agent reads another agent's records |
/// | `OperationFailed` | Record store failures, poisoned locks, config I/O |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation is not valid in the current state.
    ///
    /// Raised when:
    /// - `capture` is called while the consolidation service is in SLEEP
    /// - A SLEEP pass is called while in WAKE
    /// - A consent check has neither a requester nor a current agent
    #[error("operation '{operation}' not allowed: {reason}")]
    InvalidState {
        /// The operation that was attempted.
        operation: String,
        /// Why the current state rejects it.
        reason: String,
    },

    /// A referenced record does not exist.
    #[error("operation '{operation}': record '{id}' not found")]
    NotFound {
        /// The operation that was attempted.
        operation: String,
        /// The missing record id.
        id: String,
    },

    /// A bounded resource is exhausted.
    #[error("operation '{operation}' rejected: {limit}")]
    ResourceLimit {
        /// The operation that was attempted.
        operation: String,
        /// Which limit was hit.
        limit: String,
    },

    /// Cross-agent access without consent.
    #[error("consent required: '{requester}' may not access records of '{target}'")]
    ConsentRequired {
        /// The agent that asked.
        requester: String,
        /// The agent that owns the records.
        target: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - The record store rejects a write or query
    /// - A lock guarding shared state is poisoned
    /// - A config file cannot be read or parsed
    /// - Logging initialization fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidState`].
    pub(crate) fn invalid_state(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::OperationFailed`].
    pub(crate) fn operation_failed(operation: &str, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for katra operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use katra::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
