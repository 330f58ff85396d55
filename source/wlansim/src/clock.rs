//! The simulated millisecond clock.
//!
//! Simulated time is not wall-clock time: it only moves when a task "spends"
//! time, and every task that spends time adds to it. Two tasks sleeping 100ms
//! concurrently advance the clock by 200ms.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

pub struct Clock {
    now_ms: AtomicU64,
    /// Real time spent per simulated millisecond.
    tick: Duration,
    advanced: Notify,
}

impl Clock {
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        Self {
            now_ms: AtomicU64::new(0),
            tick,
            advanced: Notify::new(),
        }
    }

    /// Current simulated time, in milliseconds.
    pub fn now(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    /// Advance the clock by `ms`, returning the new time.
    pub fn advance(&self, ms: u64) -> u64 {
        let now = self.now_ms.fetch_add(ms, Ordering::AcqRel) + ms;
        self.advanced.notify_waiters();
        now
    }

    /// Sleep for `ms` simulated milliseconds, then account for them.
    pub async fn spend(&self, ms: u64) -> u64 {
        let ms32 = u32::try_from(ms).unwrap_or(u32::MAX);
        match self.tick.checked_mul(ms32) {
            Some(dur) if !dur.is_zero() => tokio::time::sleep(dur).await,
            _ => tokio::task::yield_now().await,
        }
        self.advance(ms)
    }

    /// Resolves once the clock has reached `deadline`.
    pub async fn wait_until(&self, deadline: u64) {
        loop {
            // `notify_waiters` reaches this future from the moment it is
            // created, so no advance can slip in between the check and the
            // await.
            let advanced = self.advanced.notified();
            if self.now() >= deadline {
                return;
            }
            advanced.await;
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }
}

impl core::fmt::Debug for Clock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Clock")
            .field("now_ms", &self.now())
            .field("tick", &self.tick)
            .finish()
    }
}
