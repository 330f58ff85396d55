//! Event counters for a simulation run.

use core::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;
use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

/// How many retired ACK sequence numbers are remembered.
pub const RETIRED_HISTORY: usize = 1024;

macro_rules! counters {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        #[derive(Debug, Default)]
        pub struct Counters {
            $($(#[$meta])* pub $name: AtomicU64,)+
        }

        #[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
        pub struct StatsSnapshot {
            $($(#[$meta])* pub $name: u64,)+
        }

        impl Counters {
            fn snapshot(&self) -> StatsSnapshot {
                StatsSnapshot {
                    $($name: self.$name.load(Ordering::Acquire),)+
                }
            }
        }
    };
}

counters! {
    /// TX packets accepted by the TX ring.
    tx_pushed,
    /// Pushes rejected because the TX ring was full.
    tx_full,
    /// Push attempts repeated after a backoff.
    tx_retries,
    /// TX packets freed without ever entering the ring.
    tx_dropped,
    /// TX critical sections entered.
    irq_masks,
    /// TX packets popped and processed by the firmware.
    fw_processed,
    /// ACKs accepted by the RX ring.
    acks_pushed,
    /// ACKs freed because the RX ring was full.
    rx_dropped,
    /// Doorbell rings that left a new wakeup pending.
    doorbell_delivered,
    /// Doorbell rings folded into an already-pending wakeup.
    doorbell_coalesced,
    /// Completions whose notification was dropped while masked.
    doorbell_masked,
    /// Bottom-half wakes.
    bh_wakes,
    /// ACKs popped and freed by the bottom half.
    acks_retired,
    /// Bottom-half wakes that found the RX ring empty.
    empty_wakes,
    /// `ACTIVE -> POWERSAVE` transitions.
    power_save_entries,
    /// `POWERSAVE -> ACTIVE` transitions.
    power_wakes,
}

#[derive(Debug, Default)]
pub struct Stats {
    counters: Counters,
    retired: Mutex<VecDeque<u32>>,
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(&self, counter: impl FnOnce(&Counters) -> &AtomicU64) {
        counter(&self.counters).fetch_add(1, Ordering::AcqRel);
    }

    /// Remember that the ACK for `seq` was retired.
    pub fn record_retired(&self, seq: u32) {
        self.incr(|c| &c.acks_retired);
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        if retired.len() == RETIRED_HISTORY {
            retired.pop_front();
        }
        retired.push_back(seq);
    }

    /// The most recently retired sequence numbers, oldest first.
    pub fn retired(&self) -> Vec<u32> {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_history() {
        let stats = Stats::new();
        stats.incr(|c| &c.tx_pushed);
        stats.incr(|c| &c.tx_pushed);
        stats.record_retired(0);
        stats.record_retired(1);

        let snap = stats.snapshot();
        assert_eq!(snap.tx_pushed, 2);
        assert_eq!(snap.acks_retired, 2);
        assert_eq!(snap.tx_full, 0);
        assert_eq!(stats.retired(), [0, 1]);
    }

    #[test]
    fn history_is_bounded() {
        let stats = Stats::new();
        for seq in 0..(RETIRED_HISTORY as u32 + 10) {
            stats.record_retired(seq);
        }
        let retired = stats.retired();
        assert_eq!(retired.len(), RETIRED_HISTORY);
        assert_eq!(retired[0], 10);
        assert_eq!(stats.snapshot().acks_retired, RETIRED_HISTORY as u64 + 10);
    }
}
