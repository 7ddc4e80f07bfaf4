//! Derived state module
//!
//! This module contains the ephemeral timer state and the pure engine
//! that computes it from a persisted record.

pub mod engine;
pub mod timer_state;

// Re-export main types
pub use engine::compute_state;
pub use timer_state::{TimerState, TimerStatus};
