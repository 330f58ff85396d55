use crate::clock::Clock;

/// An exponential backoff, measured in simulated milliseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExpBackoff {
    max: u64,
    cur: u64,
}

impl ExpBackoff {
    const DEFAULT_MAX_FACTOR: u64 = 8;

    #[must_use]
    pub const fn new(min_ms: u64) -> Self {
        Self {
            max: min_ms.saturating_mul(Self::DEFAULT_MAX_FACTOR),
            cur: min_ms,
        }
    }

    /// Spend the current backoff period on `clock`, doubling the backoff for
    /// the next call to `wait`.
    pub async fn wait(&mut self, clock: &Clock) {
        tracing::trace!("backing off for {}ms...", self.cur);

        let cur = self.cur;

        if self.cur < self.max {
            self.cur = self.cur.saturating_mul(2).min(self.max);
        }

        clock.spend(cur).await;
    }
}
