//! Time sources and one-shot timers for refresh scheduling.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Wall clock in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;

    fn now_secs(&self) -> i64 {
        self.now_ms().div_euclid(1000)
    }
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub const fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Cancels an armed timer.
#[must_use = "dropping a handle leaves the timer armed"]
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle for a timer that was never armed.
    #[must_use]
    pub const fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Runs a task once after a delay.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Timers backed by spawned tokio tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime; refresh timer not armed");
            return TimerHandle::noop();
        };

        let join = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        TimerHandle::new(move || join.abort())
    }
}

/// Collects timers and runs them on demand.
#[derive(Default)]
pub struct ManualScheduler {
    pending: std::sync::Arc<Mutex<Vec<PendingTimer>>>,
}

struct PendingTimer {
    id: u64,
    delay: Duration,
    task: Task,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays of timers that are still armed, in arming order.
    #[must_use]
    pub fn pending_delays(&self) -> Vec<Duration> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|timer| timer.delay)
            .collect()
    }

    /// Run the oldest armed timer. Returns `false` if none is armed.
    pub async fn fire_next(&self) -> bool {
        let next = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.is_empty() {
                None
            } else {
                Some(pending.remove(0))
            }
        };

        match next {
            Some(timer) => {
                timer.task.await;
                true
            }
            None => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        static NEXT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingTimer { id, delay, task });

        let pending = std::sync::Arc::clone(&self.pending);
        TimerHandle::new(move || {
            pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|timer| timer.id != id);
        })
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending_delays())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[tokio::test]
    async fn test_manual_scheduler_cancel_removes_timer() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&fired);
        let handle = scheduler.schedule(
            Duration::from_secs(5),
            Box::pin(async move { flag.store(true, Ordering::SeqCst) }),
        );
        assert_eq!(scheduler.pending_delays(), vec![Duration::from_secs(5)]);

        handle.cancel();
        assert!(scheduler.pending_delays().is_empty());
        assert!(!scheduler.fire_next().await);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_manual_scheduler_fires_in_order() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&fired);
        let _handle = scheduler.schedule(
            Duration::from_millis(10),
            Box::pin(async move { flag.store(true, Ordering::SeqCst) }),
        );

        assert!(scheduler.fire_next().await);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tokio_timer_abort() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let handle = TokioScheduler.schedule(
            Duration::from_millis(20),
            Box::pin(async move { flag.store(true, Ordering::SeqCst) }),
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_500);
        assert_eq!(clock.now_secs(), 1);
        clock.advance(Duration::from_millis(600));
        assert_eq!(clock.now_ms(), 2_100);
        clock.set(-1);
        assert_eq!(clock.now_secs(), -1);
    }
}
