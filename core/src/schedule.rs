//! Fixed-interval polling

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Source of delays between polls
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only records requested sleeps.
///
/// Yields the thread instead of blocking so pollers make progress
/// without wall-clock delays.
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed_ms: AtomicU64,
    sleeps: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total simulated time slept
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }

    /// Number of sleep calls
    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) {
        self.elapsed_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        std::thread::yield_now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    Cancelled,
}

/// Check `ready` immediately and then once per `interval` until it holds
/// or `cancelled` is set.
pub fn poll_until<F>(
    clock: &dyn Clock,
    interval: Duration,
    cancelled: &AtomicBool,
    mut ready: F,
) -> PollOutcome
where
    F: FnMut() -> bool,
{
    loop {
        if cancelled.load(Ordering::Acquire) {
            return PollOutcome::Cancelled;
        }
        if ready() {
            return PollOutcome::Ready;
        }
        clock.sleep(interval);
    }
}
