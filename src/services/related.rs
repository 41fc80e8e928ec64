//! Consent-checked graph queries over stored records.

use crate::Result;
use crate::models::{ConnectionHub, MemoryQuery, MemoryRecord, RecordId, RelatedMemory};
use crate::services::consent::ConsentGate;
use crate::services::graph::ConnectionGraph;
use crate::storage::RecordStore;
use std::sync::Arc;
use tracing::instrument;

/// Default number of recent records a query loads.
pub const DEFAULT_QUERY_LIMIT: usize = 1000;

/// Hub and related-memory lookups for the current agent.
///
/// Every query first checks the [`ConsentGate`] context against the agent
/// whose records are read.
pub struct GraphQueryService {
    store: Arc<dyn RecordStore>,
    consent: Arc<ConsentGate>,
    graph: ConnectionGraph,
    query_limit: usize,
}

impl std::fmt::Debug for GraphQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQueryService")
            .field("graph", &self.graph)
            .field("query_limit", &self.query_limit)
            .finish_non_exhaustive()
    }
}

impl GraphQueryService {
    /// Creates a service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, consent: Arc<ConsentGate>) -> Self {
        Self {
            store,
            consent,
            graph: ConnectionGraph::new(),
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }

    /// Sets the connection graph.
    #[must_use]
    pub const fn with_graph(mut self, graph: ConnectionGraph) -> Self {
        self.graph = graph;
        self
    }

    /// Sets how many records a query loads (at least 1).
    #[must_use]
    pub fn with_query_limit(mut self, limit: usize) -> Self {
        self.query_limit = limit.max(1);
        self
    }

    /// Records of `agent_id` whose centrality is at least `min_centrality`.
    ///
    /// # Errors
    ///
    /// Returns a consent error if the current agent is not `agent_id`, or a
    /// store error.
    #[instrument(skip(self), fields(agent = %agent_id))]
    pub fn connection_hubs(
        &self,
        agent_id: &str,
        min_centrality: f32,
    ) -> Result<Vec<ConnectionHub>> {
        self.consent.check_current(agent_id)?;
        let mut records = self.load(agent_id)?;
        let hubs = self.graph.connection_hubs(&mut records, min_centrality);
        self.store.free(records);
        tracing::debug!(hubs = hubs.len(), "Found connection hubs");
        Ok(hubs)
    }

    /// Records of `agent_id` connected to `target`, most similar first.
    ///
    /// # Errors
    ///
    /// Returns a consent error, a store error, or [`crate::Error::NotFound`]
    /// if `target` is not among the agent's recent records.
    #[instrument(skip(self), fields(agent = %agent_id, target = %target))]
    pub fn related_memories(
        &self,
        agent_id: &str,
        target: &RecordId,
        max_results: usize,
        min_similarity: f32,
    ) -> Result<Vec<RelatedMemory>> {
        self.consent.check_current(agent_id)?;
        let records = self.load(agent_id)?;
        let related = self
            .graph
            .related(&records, target, max_results, min_similarity);
        self.store.free(records);
        related
    }

    /// Loads the agent's `query_limit` most recent records in timestamp order.
    fn load(&self, agent_id: &str) -> Result<Vec<MemoryRecord>> {
        let mut records = self.store.query(&MemoryQuery::for_agent(agent_id))?;
        if records.len() > self.query_limit {
            records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            records.truncate(self.query_limit);
            records.sort_by_key(|r| r.timestamp);
        }
        Ok(records)
    }
}
