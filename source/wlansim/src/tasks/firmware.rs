use crate::{
    doorbell::Ring,
    packet::{Packet, DESC_LEN},
    SimContext, SimError,
};
use descring::{Empty, Full};
use std::sync::Arc;

/// The device firmware: consumer of the TX ring and producer of the RX ring.
pub struct Firmware {
    ctx: Arc<SimContext>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FwStep {
    /// A TX packet was processed and acknowledged.
    Processed { seq: u32 },
    /// The TX ring was empty; the firmware polled and slept.
    Idle,
}

impl Firmware {
    pub const PRIORITY: u8 = 3;

    #[must_use]
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(mut self) -> Result<(), SimError> {
        tracing::debug!("firmware running");
        loop {
            self.step().await?;
        }
    }

    pub async fn step(&mut self) -> Result<FwStep, SimError> {
        let ctx = &self.ctx;

        // The TX lock must not be held while "processing": it is released at
        // the end of this statement, before any time is spent.
        let popped = ctx.tx_ring().lock().await.pop();

        let (pkt, len) = match popped {
            Ok(desc) => desc,
            Err(Empty) => {
                self.idle().await;
                return Ok(FwStep::Idle);
            }
        };
        if len != DESC_LEN {
            return Err(SimError::Invariant(
                "TX descriptor length does not match the packet wire length",
            ));
        }

        let seq = pkt.sequence();
        let now = ctx.clock().now();
        if ctx.power().mark_active(now) {
            ctx.stats().incr(|c| &c.power_wakes);
            tracing::info!(t_ms = now, "    [FW] Leave Power Save Mode");
        }
        ctx.stats().incr(|c| &c.fw_processed);
        tracing::info!(t_ms = now, seq, payload = pkt.payload(), "    [FW] RX pkt from Driver");

        ctx.clock().spend(ctx.settings().fw_proc_ms).await;

        let ack = ctx.pool().alloc(Packet::ack(seq))?;
        let pushed = ctx.rx_ring().lock().await.push(ack, DESC_LEN);
        let now = ctx.clock().now();
        match pushed {
            Ok(()) => {
                ctx.stats().incr(|c| &c.acks_pushed);
                tracing::info!(t_ms = now, seq, "    [FW] TX ACK → Driver");
            }
            Err(Full(ack)) => {
                drop(ack);
                ctx.stats().incr(|c| &c.rx_dropped);
                tracing::warn!(t_ms = now, seq, "    [FW] RX ring full, ACK dropped");
            }
        }
        drop(pkt);

        self.notify_driver(seq);
        Ok(FwStep::Processed { seq })
    }

    /// Ring the doorbell for a completion, unless interrupts are masked, in
    /// which case the notification is dropped. The ACK stays in the RX ring
    /// until some later doorbell ring wakes the bottom half.
    fn notify_driver(&self, seq: u32) {
        let ctx = &self.ctx;
        let now = ctx.clock().now();
        if ctx.irq().is_masked() {
            ctx.stats().incr(|c| &c.doorbell_masked);
            tracing::info!(t_ms = now, seq, "    [FW] IRQ masked, notification dropped");
            return;
        }

        match ctx.doorbell().ring() {
            Ring::Delivered => {
                ctx.stats().incr(|c| &c.doorbell_delivered);
                tracing::debug!(t_ms = now, seq, "    [FW] doorbell rung");
            }
            Ring::Coalesced => {
                ctx.stats().incr(|c| &c.doorbell_coalesced);
                tracing::debug!(t_ms = now, seq, "    [FW] doorbell already pending, coalesced");
            }
        }
    }

    async fn idle(&self) {
        let ctx = &self.ctx;
        let now = ctx.clock().now();
        if ctx
            .power()
            .enter_power_save_if_idle(now, ctx.settings().idle_timeout_ms)
        {
            ctx.stats().incr(|c| &c.power_save_entries);
            tracing::info!(
                t_ms = now,
                last_active_ms = ctx.power().last_active(),
                "    [FW] Enter Power Save Mode"
            );
        }
        ctx.clock().spend(ctx.settings().idle_poll_ms).await;
    }
}
