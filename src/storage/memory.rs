//! In-memory record store.
//!
//! Provides a fast, non-persistent implementation of [`RecordStore`] for use
//! in tests, benchmarks and embedders that persist records themselves.

use crate::models::{MemoryQuery, MemoryRecord, RecordAnnotation, RecordId};
use crate::storage::traits::RecordStore;
use crate::{Error, Result};
use std::sync::RwLock;

/// In-memory record store.
///
/// Uses `RwLock` for thread-safe access. Queries return records in insertion
/// order; re-storing an existing ID replaces it in place.
///
/// # Example
///
/// ```rust
/// use katra::storage::{InMemoryRecordStore, RecordStore};
/// use katra::{MemoryQuery, MemoryType};
///
/// let store = InMemoryRecordStore::new();
/// let record = store.create("ci-alpha", MemoryType::Knowledge, "Rust has no GC", 0.6);
/// store.store(&record)?;
/// assert_eq!(store.query(&MemoryQuery::for_agent("ci-alpha"))?.len(), 1);
/// # Ok::<(), katra::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryRecordStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if a record with this ID is stored.
    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.records
            .read()
            .map(|r| r.iter().any(|record| &record.id == id))
            .unwrap_or(false)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn store(&self, record: &MemoryRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| Error::OperationFailed {
            operation: "store_record".to_string(),
            cause: "Lock poisoned".to_string(),
        })?;

        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            existing.clone_from(record);
        } else {
            records.push(record.clone());
        }
        Ok(())
    }

    fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryRecord>> {
        let records = self.records.read().map_err(|_| Error::OperationFailed {
            operation: "query_records".to_string(),
            cause: "Lock poisoned".to_string(),
        })?;

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(records
            .iter()
            .filter(|r| query.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    fn annotate(&self, id: &RecordId, annotation: &RecordAnnotation) -> Result<bool> {
        let mut records = self.records.write().map_err(|_| Error::OperationFailed {
            operation: "annotate_record".to_string(),
            cause: "Lock poisoned".to_string(),
        })?;

        Ok(records.iter_mut().find(|r| &r.id == id).is_some_and(|r| {
            annotation.apply_to(r);
            true
        }))
    }
}
