//! Timer record structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a timer counts: up from zero, or down from a fixed duration.
///
/// The kind is fixed once a timer starts; extending a countdown goes
/// through the explicit `add_remaining_time` operation instead of a
/// kind change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerKind {
    Stopwatch,
    Countdown {
        /// Target duration in seconds
        duration: f64,
    },
}

/// One pause window; an absent `resumed_at` means the timer is still paused
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausePeriod {
    pub paused_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<DateTime<Utc>>,
}

/// Durable description of a timer's lifecycle events.
///
/// The record is the sole persisted artifact: no status field is stored,
/// status is always derived from the timestamps at read time. At most one
/// pause period may be open (absent `resumed_at`), and only the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub pause_periods: Vec<PausePeriod>,
    pub kind: TimerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl TimerRecord {
    /// Fresh record as written by `start`
    pub fn new(started_at: DateTime<Utc>, kind: TimerKind) -> Self {
        Self {
            started_at,
            pause_periods: Vec::new(),
            kind,
            stopped_at: None,
        }
    }

    /// True while the last pause period is still open
    pub fn is_paused(&self) -> bool {
        self.pause_periods
            .last()
            .is_some_and(|p| p.resumed_at.is_none())
    }

    /// Check the structural invariants: periods ordered by `paused_at`,
    /// non-overlapping, at most one open period and only in last position,
    /// and `stopped_at` (if set) not before any recorded boundary.
    pub fn validate(&self) -> bool {
        let mut previous_end = self.started_at;
        let last_index = self.pause_periods.len().saturating_sub(1);

        for (index, period) in self.pause_periods.iter().enumerate() {
            if period.paused_at < previous_end {
                return false;
            }
            match period.resumed_at {
                Some(resumed_at) => {
                    if resumed_at < period.paused_at {
                        return false;
                    }
                    previous_end = resumed_at;
                }
                None => {
                    if index != last_index {
                        return false;
                    }
                    previous_end = period.paused_at;
                }
            }
        }

        match self.stopped_at {
            Some(stopped_at) => stopped_at >= self.started_at && stopped_at >= previous_end,
            None => true,
        }
    }
}
