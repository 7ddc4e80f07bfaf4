//! Persisted timer record module
//!
//! This module contains the durable description of a timer's lifecycle
//! events and the byte codec used by the key-value backends.

pub mod codec;
pub mod model;

// Re-export main types
pub use model::{PausePeriod, TimerKind, TimerRecord};
