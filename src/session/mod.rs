//! Live session module
//!
//! This module contains the per-timer session handle that publishes
//! computed states, and the tick source abstraction that drives it.

pub mod live_session;
pub mod ticker;

// Re-export main types
pub use live_session::{LiveSession, SessionConfig};
pub use ticker::{IntervalTicker, ManualTicker, TickSource};
