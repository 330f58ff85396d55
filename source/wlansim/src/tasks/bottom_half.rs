use crate::{packet::DESC_LEN, SimContext, SimError};
use descring::Empty;
use std::sync::Arc;

/// The driver's interrupt bottom half: the RX ring's only consumer.
///
/// Each doorbell wake retires at most one ACK.
pub struct BottomHalf {
    ctx: Arc<SimContext>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BhStep {
    Retired { seq: u32 },
    /// Woken, but the RX ring was empty.
    Empty,
}

impl BottomHalf {
    pub const PRIORITY: u8 = 1;

    #[must_use]
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(mut self) -> Result<(), SimError> {
        tracing::debug!("bottom half waiting for interrupts");
        loop {
            self.step().await?;
        }
    }

    /// Wait for the doorbell, then service the interrupt.
    pub async fn step(&mut self) -> Result<BhStep, SimError> {
        self.ctx.doorbell().wait().await;
        self.ctx.stats().incr(|c| &c.bh_wakes);
        self.service().await
    }

    /// One interrupt service pass: mask, pop at most one ACK, unmask.
    pub async fn service(&mut self) -> Result<BhStep, SimError> {
        let ctx = &self.ctx;
        let masked = ctx.irq().mask();

        let popped = ctx.rx_ring().lock().await.pop();
        let step = match popped {
            Ok((ack, len)) => {
                if len != DESC_LEN {
                    return Err(SimError::Invariant(
                        "RX descriptor length does not match the packet wire length",
                    ));
                }
                let seq = ack.sequence();
                tracing::info!(
                    t_ms = ctx.clock().now(),
                    seq,
                    payload = ack.payload(),
                    "[Driver] RX ← FW"
                );
                ctx.stats().record_retired(seq);
                drop(ack);
                BhStep::Retired { seq }
            }
            Err(Empty) => {
                ctx.stats().incr(|c| &c.empty_wakes);
                tracing::debug!(t_ms = ctx.clock().now(), "[Driver] woken with an empty RX ring");
                BhStep::Empty
            }
        };

        drop(masked);
        tracing::info!(t_ms = ctx.clock().now(), "[Driver] IRQ unmasked (ready for next)");
        Ok(step)
    }
}
