//! Pure elapsed-time and status computation

use chrono::{DateTime, Duration, Utc};

use super::{TimerState, TimerStatus};
use crate::record::TimerRecord;

/// Compute the derived state of a record at `now`.
///
/// Raw elapsed time runs from `started_at` to `stopped_at` (or `now` for a
/// live record). Pause periods are walked in order and each fully elapsed
/// window is subtracted; the first period that is still open, or whose
/// `resumed_at` lands at or after the end instant, marks the timer paused
/// and ends the walk since later periods cannot have occurred yet.
/// A set `stopped_at` always wins over running/paused.
pub fn compute_state(record: &TimerRecord, now: DateTime<Utc>) -> TimerState {
    let end = record.stopped_at.unwrap_or(now);
    let mut elapsed = delta_secs(end - record.started_at);
    let mut status = TimerStatus::Running;

    for period in &record.pause_periods {
        match period.resumed_at {
            Some(resumed_at) if resumed_at < end => {
                elapsed -= delta_secs(resumed_at - period.paused_at);
            }
            _ => {
                elapsed -= delta_secs(end - period.paused_at);
                status = TimerStatus::Paused;
                break;
            }
        }
    }

    if record.stopped_at.is_some() {
        status = TimerStatus::Finished;
    }

    TimerState {
        elapsed: elapsed.max(0.0),
        status,
        kind: record.kind.clone(),
        pause_periods: record.pause_periods.clone(),
        started_at: record.started_at,
        computed_at: now,
    }
}

fn delta_secs(delta: Duration) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PausePeriod, TimerKind};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    #[test]
    fn no_pauses_means_elapsed_since_start() {
        let record = TimerRecord::new(t0(), TimerKind::Stopwatch);
        let state = compute_state(&record, at(42));
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.elapsed, 42.0);
        assert_eq!(state.computed_at, at(42));
        assert_eq!(state.remaining(), None);
    }

    #[test]
    fn open_pause_freezes_elapsed() {
        let mut record = TimerRecord::new(t0(), TimerKind::Stopwatch);
        record.pause_periods.push(PausePeriod {
            paused_at: at(10),
            resumed_at: None,
        });

        // frozen at 10s no matter how much later we look
        let state = compute_state(&record, at(10));
        assert_eq!(state.status, TimerStatus::Paused);
        assert_eq!(state.elapsed, 10.0);

        let state = compute_state(&record, at(300));
        assert_eq!(state.status, TimerStatus::Paused);
        assert_eq!(state.elapsed, 10.0);
    }

    #[test]
    fn completed_pause_is_subtracted() {
        let mut record = TimerRecord::new(t0(), TimerKind::Stopwatch);
        record.pause_periods.push(PausePeriod {
            paused_at: at(10),
            resumed_at: Some(at(25)),
        });

        let state = compute_state(&record, at(30));
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.elapsed, 15.0);
    }

    #[test]
    fn resume_at_end_instant_still_counts_as_paused() {
        let mut record = TimerRecord::new(t0(), TimerKind::Stopwatch);
        record.pause_periods.push(PausePeriod {
            paused_at: at(10),
            resumed_at: Some(at(20)),
        });

        let state = compute_state(&record, at(20));
        assert_eq!(state.status, TimerStatus::Paused);
        assert_eq!(state.elapsed, 10.0);

        // one instant later the pause is fully behind us
        let state = compute_state(&record, at(21));
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.elapsed, 11.0);
    }

    #[test]
    fn stopped_record_is_finished_and_frozen() {
        let mut record = TimerRecord::new(t0(), TimerKind::Countdown { duration: 10.0 });
        record.stopped_at = Some(at(2));

        let state = compute_state(&record, at(12));
        assert_eq!(state.status, TimerStatus::Finished);
        assert_eq!(state.elapsed, 2.0);
        assert_eq!(state.remaining(), Some(8.0));
    }

    #[test]
    fn stop_during_open_pause_honors_the_pause_boundary() {
        let mut record = TimerRecord::new(t0(), TimerKind::Stopwatch);
        record.pause_periods.push(PausePeriod {
            paused_at: at(5),
            resumed_at: None,
        });
        record.stopped_at = Some(at(9));

        // pause window from 5s to the stop at 9s does not count
        let state = compute_state(&record, at(20));
        assert_eq!(state.status, TimerStatus::Finished);
        assert_eq!(state.elapsed, 5.0);
    }

    #[test]
    fn multiple_pauses_accumulate() {
        let mut record = TimerRecord::new(t0(), TimerKind::Stopwatch);
        record.pause_periods.push(PausePeriod {
            paused_at: at(10),
            resumed_at: Some(at(15)),
        });
        record.pause_periods.push(PausePeriod {
            paused_at: at(20),
            resumed_at: Some(at(30)),
        });

        let state = compute_state(&record, at(40));
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.elapsed, 25.0);
    }

    #[test]
    fn elapsed_never_goes_negative() {
        // started_at ahead of now, e.g. a clock that jumped backwards
        let record = TimerRecord::new(at(10), TimerKind::Stopwatch);
        let state = compute_state(&record, t0());
        assert_eq!(state.elapsed, 0.0);
    }

    #[test]
    fn countdown_overrun_is_representable() {
        let record = TimerRecord::new(t0(), TimerKind::Countdown { duration: 10.0 });
        let state = compute_state(&record, at(25));
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining(), Some(-15.0));
    }
}
