//! Conversation analysis seam.
//!
//! During WAKE the consolidation service hands each exchange to an analyzer,
//! which proposes memories the agent did not store explicitly.

use crate::Result;
use crate::models::MemoryType;
use serde::{Deserialize, Serialize};

/// A memory proposed by a [`ConversationAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCandidate {
    /// Proposed content.
    pub content: String,
    /// Proposed importance (clamped on storage).
    pub importance: f32,
    /// Proposed type.
    pub memory_type: MemoryType,
    /// Why the analyzer proposed it.
    pub reason: String,
    /// Whether the agent reached the same memory consciously as well.
    pub converged: bool,
}

impl MemoryCandidate {
    /// Creates a non-converged candidate.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        memory_type: MemoryType,
        importance: f32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            importance,
            memory_type,
            reason: reason.into(),
            converged: false,
        }
    }

    /// Marks the candidate as converged.
    #[must_use]
    pub const fn converged(mut self) -> Self {
        self.converged = true;
        self
    }
}

/// Extracts candidate memories from a conversational exchange.
pub trait ConversationAnalyzer: Send + Sync {
    /// Analyzes one input/response pair for `agent_id`.
    fn analyze(&self, agent_id: &str, input: &str, response: &str)
    -> Result<Vec<MemoryCandidate>>;
}
