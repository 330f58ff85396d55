//! Simulation settings.
//!
//! [`SimSettings`] is what the simulation runs with. [`SimSettingsOverrides`]
//! is the deserializable form, where every field is optional and missing
//! fields take the defaults below.

use crate::SimError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSettings {
    /// Slots per descriptor ring. One slot is always left empty. Defaults to 8
    pub ring_capacity: usize,
    /// Maximum packets alive at once across both rings and all tasks.
    /// Defaults to 32, or [`SimSettings::min_pool_capacity`] for larger
    /// rings
    pub pool_capacity: usize,
    /// Delay between TX packets, in simulated ms. Defaults to 300
    pub tx_period_ms: u64,
    /// Mask interrupts after every `mask_every`th TX packet; 0 disables.
    /// Defaults to 5
    pub mask_every: u32,
    /// How long the TX critical section keeps interrupts masked. Defaults to 200
    pub mask_hold_ms: u64,
    /// Simulated firmware processing time per packet. Defaults to 150
    pub fw_proc_ms: u64,
    /// Idle time after which the firmware enters power-save. Defaults to 500
    pub idle_timeout_ms: u64,
    /// Firmware poll interval while the TX ring is empty. Defaults to 50
    pub idle_poll_ms: u64,
    /// Real time per simulated millisecond. Defaults to 1ms
    pub tick: Duration,
    /// What the TX path does with a packet the TX ring rejects.
    pub tx_full: TxFullPolicy,
    /// Stop producing after this many TX packets. Defaults to unbounded
    pub tx_packet_limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum TxFullPolicy {
    /// Free the packet and move on.
    Drop,
    /// Back off and try again, up to `max_retries` times, then free it.
    Retry { max_retries: u32, backoff_ms: u64 },
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimSettingsOverrides {
    pub ring_capacity: Option<usize>,
    pub pool_capacity: Option<usize>,
    pub tx_period_ms: Option<u64>,
    pub mask_every: Option<u32>,
    pub mask_hold_ms: Option<u64>,
    pub fw_proc_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub idle_poll_ms: Option<u64>,
    /// Real microseconds per simulated millisecond.
    pub tick_us: Option<u64>,
    pub tx_full: Option<TxFullPolicy>,
    pub tx_packet_limit: Option<u32>,
}

impl SimSettings {
    pub const DEFAULT_RING_CAPACITY: usize = 8;
    pub const DEFAULT_POOL_CAPACITY: usize = 32;
    pub const DEFAULT_TX_PERIOD_MS: u64 = 300;
    pub const DEFAULT_MASK_EVERY: u32 = 5;
    pub const DEFAULT_MASK_HOLD_MS: u64 = 200;
    pub const DEFAULT_FW_PROC_MS: u64 = 150;
    pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 500;
    pub const DEFAULT_IDLE_POLL_MS: u64 = 50;
    pub const DEFAULT_TICK: Duration = Duration::from_millis(1);
    pub const DEFAULT_TX_FULL: TxFullPolicy = TxFullPolicy::Drop;

    /// The smallest pool that can never run dry before a ring reports full:
    /// both rings full, plus the packet the TX path is submitting and the
    /// firmware's TX packet and ACK.
    pub const fn min_pool_capacity(ring_capacity: usize) -> usize {
        2 * ring_capacity.saturating_sub(1) + 3
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.ring_capacity < 2 {
            return Err(SimError::InvalidConfig(
                "ring capacity must be at least 2 slots",
            ));
        }
        if self.pool_capacity < Self::min_pool_capacity(self.ring_capacity) {
            return Err(SimError::InvalidConfig(
                "packet pool is too small to fill both rings",
            ));
        }
        Ok(())
    }

    /// Sets the ring capacity, growing the pool if it could no longer fill
    /// both rings.
    #[must_use]
    pub fn with_ring_capacity(self, ring_capacity: usize) -> Self {
        Self {
            ring_capacity,
            pool_capacity: self
                .pool_capacity
                .max(Self::min_pool_capacity(ring_capacity)),
            ..self
        }
    }

    #[must_use]
    pub fn with_pool_capacity(self, pool_capacity: usize) -> Self {
        Self {
            pool_capacity,
            ..self
        }
    }

    #[must_use]
    pub fn with_tx_full(self, tx_full: TxFullPolicy) -> Self {
        Self { tx_full, ..self }
    }

    #[must_use]
    pub fn with_tx_packet_limit(self, limit: impl Into<Option<u32>>) -> Self {
        Self {
            tx_packet_limit: limit.into(),
            ..self
        }
    }

    #[must_use]
    pub fn with_mask_every(self, mask_every: u32) -> Self {
        Self { mask_every, ..self }
    }

    #[must_use]
    pub fn with_tick(self, tick: Duration) -> Self {
        Self { tick, ..self }
    }
}

impl Default for SimSettings {
    fn default() -> Self {
        SimSettingsOverrides::default().into_settings()
    }
}

impl SimSettingsOverrides {
    pub fn into_settings(self) -> SimSettings {
        let ring_capacity = self
            .ring_capacity
            .unwrap_or(SimSettings::DEFAULT_RING_CAPACITY);
        SimSettings {
            ring_capacity,
            pool_capacity: self.pool_capacity.unwrap_or_else(|| {
                SimSettings::DEFAULT_POOL_CAPACITY
                    .max(SimSettings::min_pool_capacity(ring_capacity))
            }),
            tx_period_ms: self
                .tx_period_ms
                .unwrap_or(SimSettings::DEFAULT_TX_PERIOD_MS),
            mask_every: self.mask_every.unwrap_or(SimSettings::DEFAULT_MASK_EVERY),
            mask_hold_ms: self
                .mask_hold_ms
                .unwrap_or(SimSettings::DEFAULT_MASK_HOLD_MS),
            fw_proc_ms: self.fw_proc_ms.unwrap_or(SimSettings::DEFAULT_FW_PROC_MS),
            idle_timeout_ms: self
                .idle_timeout_ms
                .unwrap_or(SimSettings::DEFAULT_IDLE_TIMEOUT_MS),
            idle_poll_ms: self
                .idle_poll_ms
                .unwrap_or(SimSettings::DEFAULT_IDLE_POLL_MS),
            tick: self
                .tick_us
                .map(Duration::from_micros)
                .unwrap_or(SimSettings::DEFAULT_TICK),
            tx_full: self.tx_full.unwrap_or(SimSettings::DEFAULT_TX_FULL),
            tx_packet_limit: self.tx_packet_limit,
        }
    }

    /// Fill every field not set in `self` from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            ring_capacity: self.ring_capacity.or(fallback.ring_capacity),
            pool_capacity: self.pool_capacity.or(fallback.pool_capacity),
            tx_period_ms: self.tx_period_ms.or(fallback.tx_period_ms),
            mask_every: self.mask_every.or(fallback.mask_every),
            mask_hold_ms: self.mask_hold_ms.or(fallback.mask_hold_ms),
            fw_proc_ms: self.fw_proc_ms.or(fallback.fw_proc_ms),
            idle_timeout_ms: self.idle_timeout_ms.or(fallback.idle_timeout_ms),
            idle_poll_ms: self.idle_poll_ms.or(fallback.idle_poll_ms),
            tick_us: self.tick_us.or(fallback.tick_us),
            tx_full: self.tx_full.or(fallback.tx_full),
            tx_packet_limit: self.tx_packet_limit.or(fallback.tx_packet_limit),
        }
    }
}
