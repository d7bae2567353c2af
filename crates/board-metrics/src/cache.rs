//! Self-refreshing exposition cache
//!
//! Readers get the last successfully rendered text without ever waiting on
//! the network. A background task recomputes it every period; a failed
//! cycle keeps the previous text.

use async_trait::async_trait;
use board_core::{CacheEntry, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Produces a fresh exposition text
#[async_trait]
pub trait Recompute: Send + Sync {
    async fn recompute(&self) -> Result<String>;
}

/// What a single refresh attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New text is visible to readers
    Published,
    /// Recompute failed, previous text kept
    Failed,
    /// Another refresh was still running
    Skipped,
}

struct Shared {
    current: RwLock<Option<Arc<CacheEntry>>>,
    refreshing: AtomicBool,
    recompute: Box<dyn Recompute>,
}

/// Clears the in-progress flag even if the refresh is aborted
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shared {
    fn read(&self) -> Option<Arc<CacheEntry>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, entry: CacheEntry) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(entry));
    }

    async fn refresh(&self) -> RefreshOutcome {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.refreshing);

        info!("Refreshing board metrics...");
        let started = Instant::now();
        match self.recompute.recompute().await {
            Ok(text) => {
                self.publish(CacheEntry::new(text));
                info!("...refreshed in {:?}", started.elapsed());
                RefreshOutcome::Published
            }
            Err(e) => {
                error!("Could not refresh board metrics: {}", e);
                RefreshOutcome::Failed
            }
        }
    }
}

/// Cheap, cloneable read access to the cache
#[derive(Clone)]
pub struct CacheHandle {
    shared: Arc<Shared>,
}

impl CacheHandle {
    /// Latest entry, `None` until a refresh has succeeded
    pub fn read(&self) -> Option<Arc<CacheEntry>> {
        self.shared.read()
    }

    pub fn is_populated(&self) -> bool {
        self.read().is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.shared.refreshing.load(Ordering::Acquire)
    }
}

/// Owner of the cache and its background refresher
pub struct RefreshingCache {
    handle: CacheHandle,
    shutdown_tx: mpsc::Sender<()>,
    scheduler: JoinHandle<()>,
}

impl RefreshingCache {
    /// Refresh once, then keep refreshing every `period` in the background.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub async fn start<R: Recompute + 'static>(period: Duration, recompute: R) -> Self {
        assert!(!period.is_zero(), "refresh period must be non-zero");

        let shared = Arc::new(Shared {
            current: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            recompute: Box::new(recompute),
        });

        shared.refresh().await;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let scheduler = tokio::spawn(Self::schedule(shared.clone(), period, shutdown_rx));

        Self {
            handle: CacheHandle { shared },
            shutdown_tx,
            scheduler,
        }
    }

    /// Background task: one refresh per tick, never two at once
    async fn schedule(shared: Arc<Shared>, period: Duration, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<JoinHandle<RefreshOutcome>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if shared.refreshing.load(Ordering::Acquire) {
                        warn!("Previous refresh still running, skipping tick");
                        continue;
                    }
                    let shared = shared.clone();
                    in_flight = Some(tokio::spawn(async move { shared.refresh().await }));
                }
                _ = shutdown_rx.recv() => {
                    info!("Stopping board metrics refresher");
                    break;
                }
            }
        }

        if let Some(task) = in_flight {
            task.abort();
            // Wait for the cancelled refresh to be dropped
            let _ = task.await;
        }
    }

    pub fn handle(&self) -> CacheHandle {
        self.handle.clone()
    }

    pub fn read(&self) -> Option<Arc<CacheEntry>> {
        self.handle.read()
    }

    /// Refresh now, outside the schedule
    pub async fn refresh(&self) -> RefreshOutcome {
        self.handle.shared.refresh().await
    }

    /// Stop the schedule and abort a refresh still in flight.
    ///
    /// Returns once the aborted refresh has been dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.scheduler.await {
            warn!("Refresher task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_core::BoardError;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Returns `cycle-N`, fails while `failing` is set, and blocks on
    /// `gate` for every call after the first while `gated` is set
    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
        failing: AtomicBool,
        gated: AtomicBool,
        gate: Notify,
    }

    #[async_trait]
    impl Recompute for Arc<Counter> {
        async fn recompute(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n > 0 && self.gated.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(BoardError::fetch("projects/1", "boom"));
            }
            Ok(format!("cycle-{}", n))
        }
    }

    const LONG: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_start_populates_before_returning() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshingCache::start(LONG, counter.clone()).await;

        let entry = cache.read().unwrap();
        assert_eq!(entry.text, "cycle-0");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_start_stays_empty() {
        let counter = Arc::new(Counter::default());
        counter.failing.store(true, Ordering::SeqCst);
        let cache = RefreshingCache::start(LONG, counter.clone()).await;

        assert!(cache.read().is_none());
        assert!(!cache.handle().is_populated());

        counter.failing.store(false, Ordering::SeqCst);
        assert_eq!(cache.refresh().await, RefreshOutcome::Published);
        assert!(cache.handle().is_populated());
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_entry() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshingCache::start(LONG, counter.clone()).await;
        let before = cache.read().unwrap();

        counter.failing.store(true, Ordering::SeqCst);
        assert_eq!(cache.refresh().await, RefreshOutcome::Failed);

        let after = cache.read().unwrap();
        assert_eq!(after.text, "cycle-0");
        assert!(Arc::ptr_eq(&before, &after));
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshingCache::start(LONG, counter.clone()).await;
        counter.gated.store(true, Ordering::SeqCst);

        let handle = cache.handle();
        let slow = tokio::spawn({
            let shared = handle.shared.clone();
            async move { shared.refresh().await }
        });
        while !handle.is_refreshing() {
            tokio::task::yield_now().await;
        }

        assert_eq!(cache.refresh().await, RefreshOutcome::Skipped);
        assert_eq!(cache.read().unwrap().text, "cycle-0");

        counter.gate.notify_one();
        assert_eq!(slow.await.unwrap(), RefreshOutcome::Published);
        assert_eq!(cache.read().unwrap().text, "cycle-1");
        assert!(!handle.is_refreshing());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_periodic_refresh_and_shutdown() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshingCache::start(Duration::from_millis(20), counter.clone()).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        let calls = counter.calls.load(Ordering::SeqCst);
        assert!(calls >= 3, "expected several refreshes, got {}", calls);
        assert_ne!(cache.read().unwrap().text, "cycle-0");

        let handle = cache.handle();
        cache.shutdown().await;
        let stopped_at = counter.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), stopped_at);
        assert!(handle.is_populated());
    }

    #[tokio::test]
    async fn test_slow_refresh_drops_ticks() {
        let counter = Arc::new(Counter::default());
        let cache = RefreshingCache::start(Duration::from_millis(10), counter.clone()).await;
        counter.gated.store(true, Ordering::SeqCst);

        // Several ticks pass while the first scheduled refresh is blocked
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.read().unwrap().text, "cycle-0");

        let handle = cache.handle();
        assert!(handle.is_refreshing());
        cache.shutdown().await;

        // The blocked refresh was aborted, not left to publish later
        assert!(!handle.is_refreshing());
        counter.gate.notify_one();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.read().unwrap().text, "cycle-0");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }
}
