//! Firmware activity tracking.
//!
//! The tracker has exactly two transitions: `Active -> PowerSave` once the
//! firmware has seen an empty TX ring for longer than the idle threshold,
//! and `PowerSave -> Active` as soon as it pops a packet again.

use core::{
    fmt,
    sync::atomic::{AtomicU64, AtomicU8, Ordering},
};
use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[repr(u8)]
pub enum PowerState {
    Active = 0,
    PowerSave = 1,
}

#[derive(Debug)]
pub struct PowerTracker {
    state: AtomicU8,
    last_active_ms: AtomicU64,
}

impl PowerState {
    fn from_u8(val: u8) -> Self {
        match val {
            0 => Self::Active,
            _ => Self::PowerSave,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("ACTIVE"),
            Self::PowerSave => f.write_str("POWERSAVE"),
        }
    }
}

// === impl PowerTracker ===

impl PowerTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(PowerState::Active as u8),
            last_active_ms: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PowerState {
        PowerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn last_active(&self) -> u64 {
        self.last_active_ms.load(Ordering::Acquire)
    }

    /// Record activity at `now_ms`.
    ///
    /// Returns `true` if this woke the tracker out of power-save.
    pub fn mark_active(&self, now_ms: u64) -> bool {
        self.last_active_ms.store(now_ms, Ordering::Release);
        self.state.swap(PowerState::Active as u8, Ordering::AcqRel) == PowerState::PowerSave as u8
    }

    /// Enter power-save if more than `threshold_ms` have passed since the last
    /// recorded activity.
    ///
    /// Returns `true` only for the check that performs the transition; checks
    /// made while already in power-save return `false`.
    pub fn enter_power_save_if_idle(&self, now_ms: u64, threshold_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_active()) <= threshold_ms {
            return false;
        }
        self.state
            .compare_exchange(
                PowerState::Active as u8,
                PowerState::PowerSave as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for PowerTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_active() {
        let power = PowerTracker::new();
        assert_eq!(power.state(), PowerState::Active);
        assert_eq!(power.last_active(), 0);
    }

    #[test]
    fn threshold_is_exclusive() {
        let power = PowerTracker::new();
        assert!(!power.enter_power_save_if_idle(500, 500));
        assert_eq!(power.state(), PowerState::Active);
        assert!(power.enter_power_save_if_idle(501, 500));
        assert_eq!(power.state(), PowerState::PowerSave);
    }

    #[test]
    fn power_save_entered_once() {
        let power = PowerTracker::new();
        let transitions = (0..40u64)
            .map(|i| i * 50)
            .filter(|&now| power.enter_power_save_if_idle(now, 500))
            .count();
        assert_eq!(transitions, 1);
        assert_eq!(power.state(), PowerState::PowerSave);
    }

    #[test]
    fn activity_wakes_and_resets_idle_period() {
        let power = PowerTracker::new();
        assert!(power.enter_power_save_if_idle(600, 500));

        assert!(power.mark_active(700));
        assert_eq!(power.state(), PowerState::Active);
        assert_eq!(power.last_active(), 700);
        // already active: not a wake
        assert!(!power.mark_active(710));

        assert!(!power.enter_power_save_if_idle(1200, 500));
        assert!(power.enter_power_save_if_idle(1211, 500));
    }
}
