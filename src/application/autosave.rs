use crate::domain::models::DayKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delays saves per day so a burst of edits results in one write.
#[derive(Debug)]
pub struct SaveDebouncer {
    delay: Duration,
    pending: Mutex<HashMap<DayKey, JoinHandle<()>>>,
}

impl SaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `save` after the delay unless another save for the same day is
    /// scheduled first. Returns `false` when called outside a runtime; the
    /// caller keeps the day dirty in that case.
    pub fn schedule<F>(&self, day_key: DayKey, save: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!(day = %day_key, "no runtime; save not scheduled");
            return false;
        };
        let delay = self.delay;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            save.await;
        });

        let Ok(mut pending) = self.pending.lock() else {
            handle.abort();
            return false;
        };
        pending.retain(|_, task| !task.is_finished());
        if let Some(previous) = pending.insert(day_key, handle) {
            previous.abort();
        }
        true
    }

    pub fn cancel(&self, day_key: DayKey) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        match pending.remove(&day_key) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts every scheduled save. Returns how many had not run yet.
    pub fn cancel_all(&self) -> usize {
        let Ok(mut pending) = self.pending.lock() else {
            return 0;
        };
        let mut cancelled = 0;
        for (_, task) in pending.drain() {
            if !task.is_finished() {
                cancelled += 1;
            }
            task.abort();
        }
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .map(|pending| pending.values().filter(|task| !task.is_finished()).count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerTick {
    pub category_id: Option<String>,
    pub elapsed_seconds: Option<i64>,
}

/// Periodic task feeding the elapsed-time display and boundary polling.
/// Aborted on drop.
#[derive(Debug)]
pub struct Ticker {
    handle: JoinHandle<()>,
    receiver: watch::Receiver<TimerTick>,
}

impl Ticker {
    /// Calls `on_tick` every `period` and publishes its result. The first
    /// tick happens immediately. Returning `None` ends the ticker.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Option<TimerTick> + Send + 'static,
    {
        let (sender, receiver) = watch::channel(TimerTick::default());
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(tick) = on_tick() else {
                    let _ = sender.send(TimerTick::default());
                    break;
                };
                if sender.send(tick).is_err() {
                    break;
                }
            }
        });
        Self { handle, receiver }
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerTick> {
        self.receiver.clone()
    }

    pub fn latest(&self) -> TimerTick {
        self.receiver.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(value: &str) -> DayKey {
        DayKey::parse(value).expect("day key")
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_saves_runs_once_per_day() {
        let debouncer = SaveDebouncer::new(Duration::from_millis(200));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let runs = runs.clone();
            debouncer.schedule(day("2026-03-09"), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let other = runs.clone();
        debouncer.schedule(day("2026-03-10"), async move {
            other.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 11);
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[test]
    fn schedule_outside_runtime_is_refused() {
        let debouncer = SaveDebouncer::new(Duration::from_millis(200));
        assert!(!debouncer.schedule(day("2026-03-09"), async {}));
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_saves_never_run() {
        let debouncer = SaveDebouncer::new(Duration::from_millis(200));
        let runs = Arc::new(AtomicUsize::new(0));
        for key in ["2026-03-09", "2026-03-10"] {
            let runs = runs.clone();
            debouncer.schedule(day(key), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(debouncer.cancel(day("2026-03-09")));
        assert_eq!(debouncer.cancel_all(), 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_publishes_until_callback_ends_it() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = Ticker::spawn(Duration::from_secs(1), move || {
            let count = counter.fetch_add(1, Ordering::SeqCst) as i64;
            (count < 3).then(|| TimerTick {
                category_id: Some("study".to_string()),
                elapsed_seconds: Some(count),
            })
        });
        let mut receiver = ticker.subscribe();

        receiver.changed().await.expect("first tick");
        assert_eq!(receiver.borrow().elapsed_seconds, Some(0));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(ticker.latest().elapsed_seconds, Some(2));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticker.latest(), TimerTick::default());
        assert!(!ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_ticker_stops_calling_back() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let ticker = Ticker::spawn(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(TimerTick::default())
        });
        tokio::time::sleep(Duration::from_millis(1500)).await;
        ticker.stop();
        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }
}
