//! Timekeep - restart-safe named timers with timestamp-based state
//!
//! This library tracks the running/paused/finished state of one or more
//! named timers (stopwatches or countdowns) across process restarts. Only
//! discrete lifecycle events are persisted; elapsed time and status are
//! always derived from timestamps at read time, never stored as a counter.

pub mod clock;
pub mod error;
pub mod record;
pub mod session;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TimerError;
pub use record::{PausePeriod, TimerKind, TimerRecord};
pub use session::{IntervalTicker, LiveSession, ManualTicker, SessionConfig, TickSource};
pub use state::{compute_state, TimerState, TimerStatus};
pub use store::{FileStore, KeyValueStore, MemoryStore, TimerStore, DEFAULT_KEY_PREFIX};
