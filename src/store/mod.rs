//! Storage module
//!
//! This module contains the byte-level key-value abstraction, its durable
//! and in-memory backends, and the per-key timer lifecycle container.

pub mod file_store;
pub mod key_value;
pub mod memory_store;
pub mod timer_store;

// Re-export main types
pub use file_store::FileStore;
pub use key_value::KeyValueStore;
pub use memory_store::MemoryStore;
pub use timer_store::{TimerStore, DEFAULT_KEY_PREFIX};
