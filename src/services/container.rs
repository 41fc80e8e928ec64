//! Process-wide service wiring.
//!
//! One container owns the shared record store handle, the consent gate and
//! the configuration. Per-agent services are built on demand and share those.

use crate::config::KatraConfig;
use crate::services::consent::ConsentGate;
use crate::services::consolidation::{BackgroundConsolidator, ConsolidationService};
use crate::services::deduplication::DeduplicationService;
use crate::services::related::GraphQueryService;
use crate::services::working_memory::WorkingMemoryBuffer;
use crate::storage::RecordStore;
use std::sync::Arc;

/// Factory for katra services sharing one store and one consent gate.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use katra::services::ServiceContainer;
/// use katra::storage::InMemoryRecordStore;
/// use katra::KatraConfig;
///
/// let services = ServiceContainer::new(KatraConfig::default(), Arc::new(InMemoryRecordStore::new()));
/// services.consent().set_context(Some("ci-alpha"))?;
///
/// let hubs = services.graph_queries().connection_hubs("ci-alpha", 0.5)?;
/// assert!(hubs.is_empty());
/// # Ok::<(), katra::Error>(())
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    config: KatraConfig,
    store: Arc<dyn RecordStore>,
    consent: Arc<ConsentGate>,
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("config", &self.config)
            .field("consent", &self.consent)
            .finish_non_exhaustive()
    }
}

impl ServiceContainer {
    /// Creates a container.
    #[must_use]
    pub fn new(config: KatraConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            store,
            consent: Arc::new(ConsentGate::new()),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &KatraConfig {
        &self.config
    }

    /// Shared record store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Shared consent gate.
    #[must_use]
    pub fn consent(&self) -> Arc<ConsentGate> {
        Arc::clone(&self.consent)
    }

    /// A new working memory buffer for `agent_id`.
    #[must_use]
    pub fn working_memory(&self, agent_id: &str) -> WorkingMemoryBuffer {
        WorkingMemoryBuffer::with_config(
            agent_id,
            self.config.working_memory.clone(),
            self.store(),
        )
    }

    /// A new consolidation service for `agent_id`, starting in WAKE.
    #[must_use]
    pub fn consolidation(&self, agent_id: &str) -> ConsolidationService {
        ConsolidationService::new(agent_id, self.store())
            .with_graph(self.config.graph.build())
            .with_detector(self.config.patterns.build())
            .with_config(self.config.consolidation.clone())
    }

    /// A duplicate checker.
    #[must_use]
    pub fn deduplication(&self) -> DeduplicationService {
        DeduplicationService::new(self.store(), self.config.deduplication.clone())
    }

    /// Consent-checked graph queries.
    #[must_use]
    pub fn graph_queries(&self) -> GraphQueryService {
        GraphQueryService::new(self.store(), self.consent()).with_graph(self.config.graph.build())
    }

    /// A background annotation runner with its own bulkhead.
    ///
    /// Share one runner to share one bulkhead.
    #[must_use]
    pub fn background(&self) -> BackgroundConsolidator {
        BackgroundConsolidator::new(
            self.store(),
            self.config.graph.build(),
            self.config.patterns.build(),
            self.config.background.clone(),
        )
    }
}
