//! Working memory integration tests.
//!
//! Drives a buffer against a shared in-memory store and checks what spills
//! into the store under attention pressure.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use katra::services::ServiceContainer;
use katra::storage::{InMemoryRecordStore, RecordStore};
use katra::{Experience, KatraConfig, MemoryQuery, MemoryRecord, MemoryType, WorkingMemoryBuffer};
use std::sync::Arc;

fn experience(content: &str) -> Experience {
    Experience::new(MemoryRecord::new(
        "ci-alpha",
        MemoryType::Experience,
        content,
        0.5,
    ))
}

#[test]
fn test_attention_pressure_end_to_end() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut buffer = WorkingMemoryBuffer::new("ci-alpha", 5, store.clone());

    let attention = [0.9, 0.1, 0.5, 0.3, 0.8, 0.95];
    let mut evicted = Vec::new();
    for (i, score) in attention.iter().enumerate() {
        if let Some(id) = buffer.add(experience(&format!("experience {i}")), *score).unwrap() {
            evicted.push(id);
        }
    }

    assert_eq!(buffer.len(), 5);
    assert_eq!(evicted.len(), 1);
    assert_eq!(buffer.stats().total_evictions, 1);

    let mut held: Vec<f32> = buffer.iter().map(|item| item.attention_score).collect();
    held.sort_by(|a, b| b.partial_cmp(a).unwrap());
    assert_eq!(held, vec![0.95, 0.9, 0.8, 0.5, 0.3]);

    let stored = store.query(&MemoryQuery::for_agent("ci-alpha")).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, evicted[0]);
    assert_eq!(stored[0].content, "experience 1");
}

#[test]
fn test_capacity_never_exceeded() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut buffer = WorkingMemoryBuffer::new("ci-alpha", 7, store.clone());

    for i in 0..50 {
        buffer
            .add(experience(&format!("event {i}")), (i % 10) as f32 / 10.0)
            .unwrap();
        assert!(buffer.len() <= buffer.capacity());
    }
    assert_eq!(store.len(), 43);
}

#[test]
fn test_consolidate_then_clear_flushes_everything() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut buffer = WorkingMemoryBuffer::new("ci-alpha", 9, store.clone());
    for i in 0..9 {
        buffer
            .add(experience(&format!("item {i}")), i as f32 / 10.0)
            .unwrap();
    }
    assert!(buffer.needs_consolidation());

    // 60% of 9 rounds down to 5.
    assert_eq!(buffer.consolidate().unwrap(), 4);
    assert_eq!(buffer.len(), 5);
    assert!(buffer.iter().all(|item| item.attention_score >= 0.4 - f32::EPSILON));

    buffer.clear(false);
    assert!(buffer.is_empty());
    assert_eq!(store.len(), 9);
}

#[test]
fn test_access_boost_protects_from_eviction() {
    let store = Arc::new(InMemoryRecordStore::new());
    let mut buffer = WorkingMemoryBuffer::new("ci-alpha", 5, store.clone());
    for i in 0..5 {
        buffer.add(experience(&format!("item {i}")), 0.5).unwrap();
    }
    buffer.decay(0.5);
    buffer.access(0, 0.5).unwrap();

    let evicted = buffer.add(experience("newcomer"), 0.6).unwrap().unwrap();
    let stored = store.get("ci-alpha", &evicted).unwrap().unwrap();
    assert_eq!(stored.content, "item 1");
    assert_eq!(buffer.get(0).unwrap().experience.record.access_count, 1);
}

#[test]
fn test_container_buffer_uses_configured_capacity() {
    let config = KatraConfig {
        working_memory: katra::services::WorkingMemoryConfig::default().with_capacity(12),
        ..KatraConfig::default()
    };
    let services = ServiceContainer::new(config, Arc::new(InMemoryRecordStore::new()));

    // Clamped to the 5..=9 range.
    assert_eq!(services.working_memory("ci-alpha").capacity(), 9);
}
