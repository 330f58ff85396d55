//! The simulated interrupt path from the firmware to the driver.
//!
//! [`Doorbell`] is a single-slot notification: ringing it while a wakeup is
//! already pending does nothing, so N rings before the bottom half gets to
//! run produce exactly one wake. It is deliberately *not* a counting
//! semaphore; combined with a bottom half that retires one ACK per wake, a
//! burst of completions can leave ACKs sitting in the RX ring until some
//! later, unrelated ring.
//!
//! [`IrqMask`] models the driver's interrupt-enable bit. The firmware checks it
//! when a completion is ready, and while it is set the notification for that
//! completion is dropped rather than deferred.

use core::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

pub struct Doorbell {
    pending: AtomicBool,
    notify: Notify,
}

/// The outcome of [`Doorbell::ring`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum Ring {
    /// A new wakeup is now pending.
    Delivered,
    /// A wakeup was already pending; this ring was folded into it.
    Coalesced,
}

#[derive(Debug, Default)]
pub struct IrqMask {
    masked: AtomicBool,
}

/// Unmasks interrupts when dropped.
#[must_use = "interrupts are unmasked as soon as the guard is dropped"]
pub struct MaskGuard<'a> {
    mask: &'a IrqMask,
}

// === impl Doorbell ===

impl Doorbell {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Signal the doorbell.
    pub fn ring(&self) -> Ring {
        if self.pending.swap(true, Ordering::AcqRel) {
            return Ring::Coalesced;
        }
        self.notify.notify_one();
        Ring::Delivered
    }

    /// Wait until the doorbell is rung, consuming the pending wakeup.
    pub async fn wait(&self) {
        loop {
            if self.try_take() {
                return;
            }
            // A stale permit from a wakeup already consumed by `try_take` just
            // sends us around the loop again.
            self.notify.notified().await;
        }
    }

    /// Consume the pending wakeup without waiting, if there is one.
    pub fn try_take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for Doorbell {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Doorbell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Doorbell")
            .field("pending", &self.is_pending())
            .finish()
    }
}

// === impl IrqMask ===

impl IrqMask {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            masked: AtomicBool::new(false),
        }
    }

    /// Mask interrupts until the returned guard is dropped.
    ///
    /// This is a flag, not a nesting count: whichever guard drops first
    /// unmasks, as on the hardware it models.
    pub fn mask(&self) -> MaskGuard<'_> {
        self.masked.store(true, Ordering::Release);
        MaskGuard { mask: self }
    }

    pub fn is_masked(&self) -> bool {
        self.masked.load(Ordering::Acquire)
    }

    fn unmask(&self) {
        self.masked.store(false, Ordering::Release);
    }
}

impl Drop for MaskGuard<'_> {
    fn drop(&mut self) {
        self.mask.unmask();
    }
}
