//! Per-key timer lifecycle container

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::KeyValueStore;
use crate::clock::delta_from_secs;
use crate::error::{Result, TimerError};
use crate::record::{codec, PausePeriod, TimerKind, TimerRecord};
use crate::state::{compute_state, TimerState};

/// Key namespace prefix shared by every persisted timer record
pub const DEFAULT_KEY_PREFIX: &str = "timekeep.record";

/// Lifecycle container enforcing valid state transitions per timer key.
///
/// Each operation is a single read-modify-write against the key-value
/// backend. Timers are addressed by an optional identifier; `None` is the
/// default timer. Operations on the same key within one store instance are
/// serialized through a per-key lock; cross-process exclusion is not
/// provided.
#[derive(Clone)]
pub struct TimerStore {
    backend: Arc<dyn KeyValueStore>,
    prefix: String,
    key_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TimerStore {
    /// Create a store over `backend` with the default key namespace
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(backend, DEFAULT_KEY_PREFIX)
    }

    /// Create a store with a custom key namespace prefix
    pub fn with_prefix(backend: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            key_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Storage key for a timer identifier; `None` addresses the default timer
    fn record_key(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}.{}", self.prefix, id),
            None => self.prefix.clone(),
        }
    }

    /// Inverse of `record_key` for keys discovered through `list_keys`;
    /// returns `None` for keys outside this store's namespace
    fn identifier_of(&self, key: &str) -> Option<Option<String>> {
        if key == self.prefix {
            Some(None)
        } else {
            key.strip_prefix(&format!("{}.", self.prefix))
                .map(|id| Some(id.to_string()))
        }
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }

    async fn read_record(&self, key: &str) -> Result<Option<TimerRecord>> {
        match self.backend.read(key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_record(&self, key: &str, record: &TimerRecord) -> Result<()> {
        self.backend.write(key, codec::encode(record)?).await
    }

    /// Fetch the persisted record for a timer
    pub async fn get(&self, id: Option<&str>) -> Result<TimerRecord> {
        let key = self.record_key(id);
        self.read_record(&key).await?.ok_or(TimerError::NotStarted)
    }

    /// A timer is "running" as long as a record exists, paused or not
    pub async fn is_running(&self, id: Option<&str>) -> Result<bool> {
        let key = self.record_key(id);
        Ok(self.read_record(&key).await?.is_some())
    }

    /// Derived state for a timer at `now`, without mutating anything
    pub async fn state(&self, id: Option<&str>, now: DateTime<Utc>) -> Result<TimerState> {
        Ok(compute_state(&self.get(id).await?, now))
    }

    /// Start a timer, persisting a fresh record.
    ///
    /// Fails with `AlreadyStarted` when a record exists, unless
    /// `force_start` is set, in which case the old record is overwritten.
    pub async fn start(
        &self,
        id: Option<&str>,
        now: DateTime<Utc>,
        kind: TimerKind,
        force_start: bool,
    ) -> Result<TimerRecord> {
        let key = self.record_key(id);
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        if !force_start && self.read_record(&key).await?.is_some() {
            return Err(TimerError::AlreadyStarted);
        }

        let record = TimerRecord::new(now, kind);
        self.write_record(&key, &record).await?;
        info!("Timer started for key: {}", key);
        Ok(record)
    }

    /// Open a new pause period at `now`
    pub async fn pause(&self, id: Option<&str>, now: DateTime<Utc>) -> Result<TimerRecord> {
        let key = self.record_key(id);
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let mut record = self.read_record(&key).await?.ok_or(TimerError::NotStarted)?;
        if record.is_paused() {
            return Err(TimerError::AlreadyPaused);
        }

        record.pause_periods.push(PausePeriod {
            paused_at: now,
            resumed_at: None,
        });
        self.write_record(&key, &record).await?;
        debug!("Timer paused for key: {}", key);
        Ok(record)
    }

    /// Close the open pause period at `now`
    pub async fn resume(&self, id: Option<&str>, now: DateTime<Utc>) -> Result<TimerRecord> {
        let key = self.record_key(id);
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let mut record = self.read_record(&key).await?.ok_or(TimerError::NotStarted)?;
        let open = record
            .pause_periods
            .last_mut()
            .filter(|p| p.resumed_at.is_none())
            .ok_or(TimerError::NotPaused)?;
        open.resumed_at = Some(now);

        self.write_record(&key, &record).await?;
        debug!("Timer resumed for key: {}", key);
        Ok(record)
    }

    /// Finish a timer: stamp `stopped_at` on the in-memory copy, delete the
    /// persisted record, and return the finalized snapshot. Terminal; only
    /// a new `start` is valid for the key afterwards.
    pub async fn finish(&self, id: Option<&str>, now: DateTime<Utc>) -> Result<TimerRecord> {
        let key = self.record_key(id);
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let mut record = self.read_record(&key).await?.ok_or(TimerError::NotStarted)?;
        record.stopped_at = Some(now);
        self.backend.delete(&key).await?;
        info!("Timer finished for key: {}", key);
        Ok(record)
    }

    /// Finish every timer currently persisted in this store's namespace.
    ///
    /// Keys are discovered from the backend and finished concurrently; the
    /// first failure aborts the aggregation, and keys already finished by
    /// then are not rolled back. The default timer maps under `None`.
    pub async fn finish_all(
        &self,
        now: DateTime<Utc>,
    ) -> Result<HashMap<Option<String>, TimerRecord>> {
        let keys = self.backend.list_keys().await?;
        let ids: Vec<Option<String>> = keys
            .iter()
            .filter_map(|key| self.identifier_of(key))
            .collect();
        info!("Finishing {} active timer(s)", ids.len());

        let finished = try_join_all(ids.iter().map(|id| self.finish(id.as_deref(), now))).await?;
        Ok(ids.into_iter().zip(finished).collect())
    }

    /// Extend a countdown's duration in place; `started_at` and the pause
    /// history are untouched
    pub async fn add_remaining_time(&self, id: Option<&str>, extra_secs: f64) -> Result<TimerRecord> {
        let key = self.record_key(id);
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let mut record = self.read_record(&key).await?.ok_or(TimerError::NotStarted)?;
        match &mut record.kind {
            TimerKind::Countdown { duration } => *duration += extra_secs,
            TimerKind::Stopwatch => return Err(TimerError::InvalidTimerType),
        }

        self.write_record(&key, &record).await?;
        debug!("Added {}s remaining time for key: {}", extra_secs, key);
        Ok(record)
    }

    /// Credit a stopwatch with extra elapsed time by moving its origin
    /// earlier, as if it had started sooner
    pub async fn add_elapsed_time(&self, id: Option<&str>, extra_secs: f64) -> Result<TimerRecord> {
        let key = self.record_key(id);
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let mut record = self.read_record(&key).await?.ok_or(TimerError::NotStarted)?;
        match record.kind {
            TimerKind::Stopwatch => {
                record.started_at = record.started_at - delta_from_secs(extra_secs);
            }
            TimerKind::Countdown { .. } => return Err(TimerError::InvalidTimerType),
        }

        self.write_record(&key, &record).await?;
        debug!("Added {}s elapsed time for key: {}", extra_secs, key);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerStatus;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn store() -> TimerStore {
        TimerStore::new(Arc::new(MemoryStore::new()))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    #[tokio::test]
    async fn start_then_get_round_trips() {
        let store = store();
        let started = store
            .start(Some("a"), t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();
        let fetched = store.get(Some("a")).await.unwrap();
        assert_eq!(started, fetched);
        assert!(store.is_running(Some("a")).await.unwrap());
    }

    #[tokio::test]
    async fn get_before_start_fails() {
        let store = store();
        assert!(matches!(
            store.get(Some("a")).await,
            Err(TimerError::NotStarted)
        ));
        assert!(!store.is_running(Some("a")).await.unwrap());
    }

    #[tokio::test]
    async fn double_start_requires_force() {
        let store = store();
        store
            .start(None, t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();
        assert!(matches!(
            store.start(None, at(5), TimerKind::Stopwatch, false).await,
            Err(TimerError::AlreadyStarted)
        ));

        let forced = store
            .start(None, at(5), TimerKind::Countdown { duration: 60.0 }, true)
            .await
            .unwrap();
        assert_eq!(forced.started_at, at(5));
        assert_eq!(store.get(None).await.unwrap().kind, forced.kind);
    }

    #[tokio::test]
    async fn pause_and_resume_transitions() {
        let store = store();
        store
            .start(Some("a"), t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();

        let paused = store.pause(Some("a"), at(10)).await.unwrap();
        assert!(paused.is_paused());
        assert!(matches!(
            store.pause(Some("a"), at(11)).await,
            Err(TimerError::AlreadyPaused)
        ));

        let resumed = store.resume(Some("a"), at(20)).await.unwrap();
        assert!(!resumed.is_paused());
        assert_eq!(resumed.pause_periods[0].resumed_at, Some(at(20)));
        assert!(matches!(
            store.resume(Some("a"), at(21)).await,
            Err(TimerError::NotPaused)
        ));
    }

    #[tokio::test]
    async fn pause_without_record_fails() {
        let store = store();
        assert!(matches!(
            store.pause(Some("a"), t0()).await,
            Err(TimerError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn finish_removes_the_record_and_returns_a_snapshot() {
        let store = store();
        store
            .start(Some("a"), t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();

        let finished = store.finish(Some("a"), at(30)).await.unwrap();
        assert_eq!(finished.stopped_at, Some(at(30)));
        assert!(!store.is_running(Some("a")).await.unwrap());

        // terminal: finishing again always fails, never silently succeeds
        assert!(matches!(
            store.finish(Some("a"), at(31)).await,
            Err(TimerError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn finish_all_returns_exactly_the_active_keys() {
        let store = store();
        store
            .start(Some("a"), t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();
        store
            .start(Some("b"), t0(), TimerKind::Countdown { duration: 30.0 }, false)
            .await
            .unwrap();

        let finished = store.finish_all(at(10)).await.unwrap();
        assert_eq!(finished.len(), 2);
        assert_eq!(
            finished[&Some("a".to_string())].stopped_at,
            Some(at(10))
        );
        assert_eq!(
            finished[&Some("b".to_string())].stopped_at,
            Some(at(10))
        );
        assert!(!store.is_running(Some("a")).await.unwrap());
        assert!(!store.is_running(Some("b")).await.unwrap());
    }

    #[tokio::test]
    async fn finish_all_maps_the_default_timer_under_none() {
        let store = store();
        store
            .start(None, t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();
        store
            .start(Some("named"), t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();

        let finished = store.finish_all(at(3)).await.unwrap();
        assert_eq!(finished.len(), 2);
        assert!(finished.contains_key(&None));
        assert!(finished.contains_key(&Some("named".to_string())));
    }

    #[tokio::test]
    async fn finish_all_ignores_foreign_keys() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .write("unrelated.setting", b"{}".to_vec())
            .await
            .unwrap();

        let store = TimerStore::new(backend);
        store
            .start(Some("a"), t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();

        let finished = store.finish_all(at(1)).await.unwrap();
        assert_eq!(finished.len(), 1);
        assert!(finished.contains_key(&Some("a".to_string())));
    }

    #[tokio::test]
    async fn adjustments_enforce_the_timer_kind() {
        let store = store();
        store
            .start(Some("c"), t0(), TimerKind::Countdown { duration: 10.0 }, false)
            .await
            .unwrap();
        store
            .start(Some("s"), t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();

        assert!(matches!(
            store.add_remaining_time(Some("s"), 5.0).await,
            Err(TimerError::InvalidTimerType)
        ));
        assert!(matches!(
            store.add_elapsed_time(Some("c"), 5.0).await,
            Err(TimerError::InvalidTimerType)
        ));
    }

    #[tokio::test]
    async fn add_remaining_time_extends_the_countdown() {
        let store = store();
        store
            .start(None, t0(), TimerKind::Countdown { duration: 10.0 }, false)
            .await
            .unwrap();

        let record = store.add_remaining_time(None, 15.0).await.unwrap();
        assert_eq!(record.kind, TimerKind::Countdown { duration: 25.0 });
        assert_eq!(record.started_at, t0());
    }

    #[tokio::test]
    async fn add_elapsed_time_moves_the_origin_earlier() {
        let store = store();
        store
            .start(None, t0(), TimerKind::Stopwatch, false)
            .await
            .unwrap();

        store.add_elapsed_time(None, 5.0).await.unwrap();
        let state = store.state(None, at(3)).await.unwrap();
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.elapsed, 8.0);
    }
}
