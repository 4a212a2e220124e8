//! In-memory caches.
//!
//! [`IndexedCache`] memoizes query results over a canonical, deduplicated
//! item store and publishes a [`Generation`] that changes with its contents.

pub mod generation;
pub mod indexed;

pub use generation::Generation;
pub use indexed::IndexedCache;
