//! Record store trait.

use crate::Result;
use crate::models::{MemoryQuery, MemoryRecord, MemoryType, RecordAnnotation, RecordId};

/// Trait for the durable record store.
///
/// The store is the authoritative home of every record that leaves working
/// memory. Implementations lock internally per call; the consolidation
/// services share one handle through an `Arc`.
pub trait RecordStore: Send + Sync {
    /// Builds a new tier-1 record for an agent without storing it.
    fn create(
        &self,
        agent_id: &str,
        memory_type: MemoryType,
        content: &str,
        importance: f32,
    ) -> MemoryRecord {
        MemoryRecord::new(agent_id, memory_type, content, importance)
    }

    /// Stores a record. Idempotent on the record ID.
    fn store(&self, record: &MemoryRecord) -> Result<()>;

    /// Returns the records matching the query, in store-defined order.
    fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryRecord>>;

    /// Applies graph and pattern annotations to a stored record.
    ///
    /// Returns `false` if the record does not exist.
    fn annotate(&self, id: &RecordId, annotation: &RecordAnnotation) -> Result<bool>;

    /// Releases records returned by [`query`](Self::query).
    fn free(&self, records: Vec<MemoryRecord>) {
        drop(records);
    }

    /// Returns a single record by ID.
    fn get(&self, agent_id: &str, id: &RecordId) -> Result<Option<MemoryRecord>> {
        Ok(self
            .query(&MemoryQuery::for_agent(agent_id))?
            .into_iter()
            .find(|r| &r.id == id))
    }
}
