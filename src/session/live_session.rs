//! Live per-timer session handle

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TickSource;
use crate::clock::Clock;
use crate::error::{Result, TimerError};
use crate::record::{TimerKind, TimerRecord};
use crate::state::{compute_state, TimerState};
use crate::store::TimerStore;

/// Configuration for a live session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// When false, lifecycle operations still execute but no states are
    /// published; reading the stream in that mode is a programming error
    pub publish: bool,
    /// Cadence handed to the attached tick source
    pub tick_period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            publish: true,
            tick_period: Duration::from_millis(250),
        }
    }
}

struct SessionInner {
    store: TimerStore,
    id: Option<String>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    /// Last record returned by a lifecycle operation; avoids a redundant
    /// backend read on the next tick. The backend stays the source of
    /// truth whenever this is empty.
    cached: Mutex<Option<TimerRecord>>,
    state_tx: Mutex<Option<watch::Sender<Option<TimerState>>>>,
    state_rx: watch::Receiver<Option<TimerState>>,
    cancel: CancellationToken,
}

impl SessionInner {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn key_label(&self) -> &str {
        self.id.as_deref().unwrap_or("default")
    }

    async fn send(&self, state: TimerState) {
        if !self.config.publish {
            return;
        }
        if let Some(tx) = self.state_tx.lock().await.as_ref() {
            let _ = tx.send(Some(state));
        }
    }

    /// Cache the record from a lifecycle operation and publish its state
    async fn commit(&self, record: TimerRecord, now: DateTime<Utc>) {
        let state = compute_state(&record, now);
        *self.cached.lock().await = Some(record);
        self.send(state).await;
    }

    /// Recompute from the cached record, falling back to one backend read
    async fn publish_tick(&self) {
        let cached = { self.cached.lock().await.clone() };
        let record = match cached {
            Some(record) => record,
            None => match self.store.get(self.id()).await {
                Ok(record) => {
                    *self.cached.lock().await = Some(record.clone());
                    record
                }
                // nothing persisted yet, nothing to publish
                Err(TimerError::NotStarted) => return,
                Err(e) => {
                    warn!("Failed to read timer record on tick: {}", e);
                    return;
                }
            },
        };

        self.send(compute_state(&record, self.clock.now())).await;
    }

    /// Stop accepting ticks and close the stream; safe to call repeatedly
    async fn teardown(&self) {
        self.cancel.cancel();
        if self.state_tx.lock().await.take().is_some() {
            debug!("Live state stream closed for key: {}", self.key_label());
        }
    }
}

/// Per-timer handle wrapping a `TimerStore` for one key.
///
/// Lifecycle operations persist through the store and, when publishing is
/// enabled, push a freshly computed `TimerState` to subscribers. An
/// attached tick source drives periodic recompute-and-publish between
/// operations. After `finish` or `invalidate` the session stops ticking
/// and the stream is closed; create a new session to go live again.
pub struct LiveSession {
    inner: Arc<SessionInner>,
    ticker_attached: AtomicBool,
}

impl LiveSession {
    /// Create a session bound to one timer key.
    ///
    /// `id` disambiguates multiple concurrently tracked timers sharing one
    /// store; `None` binds to the default timer.
    pub fn new(
        store: TimerStore,
        id: Option<String>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                store,
                id,
                clock,
                config,
                cached: Mutex::new(None),
                state_tx: Mutex::new(Some(state_tx)),
                state_rx,
                cancel: CancellationToken::new(),
            }),
            ticker_attached: AtomicBool::new(false),
        }
    }

    /// Latest computed state; `None` until the first computation. The
    /// channel closes when the session is finished or invalidated.
    ///
    /// # Panics
    ///
    /// Panics when the session was configured with publishing disabled;
    /// reading the stream in that mode is a precondition violation, not a
    /// recoverable error.
    pub fn subscribe(&self) -> watch::Receiver<Option<TimerState>> {
        assert!(
            self.inner.config.publish,
            "subscribe() called on a session with publishing disabled"
        );
        self.inner.state_rx.clone()
    }

    /// Spawn the background task that recomputes and republishes on every
    /// tick until the session is torn down. Attaching twice is a no-op.
    pub fn attach_ticker(&self, source: &dyn TickSource) {
        if self.ticker_attached.swap(true, Ordering::SeqCst) {
            warn!(
                "Tick source already attached for key: {}",
                self.inner.key_label()
            );
            return;
        }

        let mut ticks = source.ticks(self.inner.config.tick_period);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    tick = ticks.next() => match tick {
                        Some(()) => inner.publish_tick().await,
                        None => break,
                    },
                }
            }
            debug!("Tick task stopped for key: {}", inner.key_label());
        });
    }

    /// Fetch the persisted record for this session's timer
    pub async fn record(&self) -> Result<TimerRecord> {
        self.inner.store.get(self.inner.id()).await
    }

    /// True while a record exists for this session's timer
    pub async fn is_running(&self) -> Result<bool> {
        self.inner.store.is_running(self.inner.id()).await
    }

    /// Derived state at the current clock instant
    pub async fn state(&self) -> Result<TimerState> {
        self.inner
            .store
            .state(self.inner.id(), self.inner.clock.now())
            .await
    }

    /// Start this session's timer
    pub async fn start(&self, kind: TimerKind, force_start: bool) -> Result<TimerRecord> {
        let now = self.inner.clock.now();
        let record = self
            .inner
            .store
            .start(self.inner.id(), now, kind, force_start)
            .await?;
        self.inner.commit(record.clone(), now).await;
        Ok(record)
    }

    /// Pause this session's timer
    pub async fn pause(&self) -> Result<TimerRecord> {
        let now = self.inner.clock.now();
        let record = self.inner.store.pause(self.inner.id(), now).await?;
        self.inner.commit(record.clone(), now).await;
        Ok(record)
    }

    /// Resume this session's timer
    pub async fn resume(&self) -> Result<TimerRecord> {
        let now = self.inner.clock.now();
        let record = self.inner.store.resume(self.inner.id(), now).await?;
        self.inner.commit(record.clone(), now).await;
        Ok(record)
    }

    /// Finish this session's timer and tear the session down.
    ///
    /// The finalized snapshot is always returned as-is; when
    /// `reset_elapsed` is set, the last published state shows zero elapsed
    /// time instead of the final value, for consumers whose display should
    /// reset on stop. A failed finish still releases the session before
    /// the error is returned.
    pub async fn finish(&self, reset_elapsed: bool) -> Result<TimerRecord> {
        let now = self.inner.clock.now();
        match self.inner.store.finish(self.inner.id(), now).await {
            Ok(record) => {
                let mut final_state = compute_state(&record, now);
                if reset_elapsed {
                    final_state.elapsed = 0.0;
                }
                self.inner.send(final_state).await;
                *self.inner.cached.lock().await = None;
                self.inner.teardown().await;
                info!("Live session finished for key: {}", self.inner.key_label());
                Ok(record)
            }
            Err(e) => {
                self.inner.teardown().await;
                Err(e)
            }
        }
    }

    /// Extend the countdown's duration and republish
    pub async fn add_remaining_time(&self, extra_secs: f64) -> Result<TimerRecord> {
        let record = self
            .inner
            .store
            .add_remaining_time(self.inner.id(), extra_secs)
            .await?;
        self.inner.commit(record.clone(), self.inner.clock.now()).await;
        Ok(record)
    }

    /// Credit the stopwatch with extra elapsed time and republish
    pub async fn add_elapsed_time(&self, extra_secs: f64) -> Result<TimerRecord> {
        let record = self
            .inner
            .store
            .add_elapsed_time(self.inner.id(), extra_secs)
            .await?;
        self.inner.commit(record.clone(), self.inner.clock.now()).await;
        Ok(record)
    }

    /// Finish every timer in the underlying store's namespace.
    ///
    /// Delegates to the store; if this session's own timer was among the
    /// finished keys its cache is dropped so a later tick cannot republish
    /// stale state.
    pub async fn finish_all(&self) -> Result<HashMap<Option<String>, TimerRecord>> {
        let finished = self.inner.store.finish_all(self.inner.clock.now()).await?;
        if finished.contains_key(&self.inner.id) {
            *self.inner.cached.lock().await = None;
        }
        Ok(finished)
    }

    /// Stop ticking and close the stream without touching persisted state;
    /// idempotent
    pub async fn invalidate(&self) {
        self.inner.teardown().await;
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        // releases the tick subscription even without an explicit teardown
        self.inner.cancel.cancel();
    }
}
