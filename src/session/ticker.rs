//! Tick source abstraction
//!
//! Sessions only need "notify me repeatedly until cancelled" semantics;
//! the underlying scheduling primitive is swappable.

use std::sync::Mutex;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;

/// External periodic-notification source driving state recomputation
pub trait TickSource: Send + Sync {
    /// Open a stream yielding one unit per tick at roughly `period`
    fn ticks(&self, period: Duration) -> BoxStream<'static, ()>;
}

/// Tokio interval-backed tick source; the first tick fires immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalTicker;

impl TickSource for IntervalTicker {
    fn ticks(&self, period: Duration) -> BoxStream<'static, ()> {
        futures::stream::unfold(tokio::time::interval(period), |mut interval| async move {
            interval.tick().await;
            Some(((), interval))
        })
        .boxed()
    }
}

/// Manually driven tick source for deterministic tests.
///
/// `ticks` hands out the receiving side once; further calls yield an
/// empty stream.
#[derive(Debug)]
pub struct ManualTicker {
    tx: mpsc::UnboundedSender<()>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Fire one tick
    pub fn tick(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for ManualTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for ManualTicker {
    fn ticks(&self, _period: Duration) -> BoxStream<'static, ()> {
        let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take();
        match rx {
            Some(rx) => futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|_| ((), rx))
            })
            .boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_ticker_delivers_fired_ticks() {
        let ticker = ManualTicker::new();
        let mut stream = ticker.ticks(Duration::from_millis(1));

        ticker.tick();
        ticker.tick();
        assert_eq!(stream.next().await, Some(()));
        assert_eq!(stream.next().await, Some(()));

        // second subscription is empty by design
        let mut second = ticker.ticks(Duration::from_millis(1));
        assert_eq!(second.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_fires_on_cadence() {
        let ticker = IntervalTicker;
        let mut stream = ticker.ticks(Duration::from_secs(1));

        // first tick is immediate
        assert_eq!(stream.next().await, Some(()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(stream.next().await, Some(()));
    }
}
