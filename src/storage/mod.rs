//! Storage layer abstraction.
//!
//! The durable tiered store lives outside this crate; katra talks to it
//! through the [`RecordStore`] trait. [`InMemoryRecordStore`] is the reference
//! implementation.

pub mod memory;
pub mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
