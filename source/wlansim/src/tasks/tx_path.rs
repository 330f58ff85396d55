use crate::{
    config::TxFullPolicy,
    packet::{Packet, DESC_LEN},
    retry::ExpBackoff,
    PooledPacket, SimContext, SimError,
};
use descring::Full;
use std::sync::Arc;

/// The driver's periodic transmit path: the TX ring's only producer.
pub struct TxPath {
    ctx: Arc<SimContext>,
    next_seq: u32,
    produced: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TxOutcome {
    /// The packet is in the TX ring. `retries` is the number of backed-off
    /// attempts it took after the first one.
    Pushed { seq: u32, retries: u32 },
    /// The TX ring had no room and the packet was freed.
    Dropped { seq: u32 },
}

impl TxPath {
    pub const PRIORITY: u8 = 2;

    #[must_use]
    pub fn new(ctx: Arc<SimContext>) -> Self {
        Self {
            ctx,
            next_seq: 0,
            produced: 0,
        }
    }

    /// The sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_seq
    }

    pub async fn run(mut self) -> Result<(), SimError> {
        tracing::debug!("driver TX path running");
        loop {
            if let Some(limit) = self.ctx.settings().tx_packet_limit {
                if self.produced >= limit {
                    tracing::info!(
                        t_ms = self.ctx.clock().now(),
                        produced = self.produced,
                        "[Driver] TX packet limit reached, going quiet"
                    );
                    return Ok(());
                }
            }
            self.step().await?;
        }
    }

    /// Build and submit one packet, run the periodic critical section if
    /// this packet is due one, then wait out the TX period.
    pub async fn step(&mut self) -> Result<TxOutcome, SimError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.produced = self.produced.saturating_add(1);

        let pkt = self.ctx.pool().alloc(Packet::tx(seq))?;
        let outcome = self.submit(pkt).await;

        let settings = self.ctx.settings();
        if settings.mask_every != 0 && self.next_seq % settings.mask_every == 0 {
            self.critical_section().await;
        }

        self.ctx.clock().spend(settings.tx_period_ms).await;
        Ok(outcome)
    }

    async fn submit(&self, mut pkt: PooledPacket) -> TxOutcome {
        let ctx = &self.ctx;
        let seq = pkt.sequence();
        let mut backoff = match ctx.settings().tx_full {
            TxFullPolicy::Retry { backoff_ms, .. } => Some(ExpBackoff::new(backoff_ms)),
            TxFullPolicy::Drop => None,
        };
        let mut retries = 0;

        loop {
            // The lock is released at the end of this statement.
            let pushed = ctx.tx_ring().lock().await.push(pkt, DESC_LEN);
            let now = ctx.clock().now();

            let Full(rejected) = match pushed {
                Ok(()) => {
                    ctx.stats().incr(|c| &c.tx_pushed);
                    tracing::info!(t_ms = now, seq, "[Driver] TX → FW");
                    return TxOutcome::Pushed { seq, retries };
                }
                Err(full) => full,
            };
            ctx.stats().incr(|c| &c.tx_full);
            tracing::warn!(t_ms = now, seq, "[Driver] TX ring full");

            match (ctx.settings().tx_full, backoff.as_mut()) {
                (TxFullPolicy::Retry { max_retries, .. }, Some(backoff)) if retries < max_retries => {
                    backoff.wait(ctx.clock()).await;
                    retries += 1;
                    ctx.stats().incr(|c| &c.tx_retries);
                    tracing::debug!(t_ms = ctx.clock().now(), seq, retries, "[Driver] retrying TX");
                    pkt = rejected;
                }
                _ => {
                    drop(rejected);
                    ctx.stats().incr(|c| &c.tx_dropped);
                    tracing::warn!(t_ms = now, seq, retries, "[Driver] TX packet dropped");
                    return TxOutcome::Dropped { seq };
                }
            }
        }
    }

    /// Mask interrupts for the configured hold time. Independent of the ring
    /// locks: no lock is held while masked.
    async fn critical_section(&self) {
        let ctx = &self.ctx;
        let masked = ctx.irq().mask();
        ctx.stats().incr(|c| &c.irq_masks);
        tracing::info!(t_ms = ctx.clock().now(), "[Driver] Mask IRQ (critical section)");

        ctx.clock().spend(ctx.settings().mask_hold_ms).await;

        drop(masked);
        tracing::info!(t_ms = ctx.clock().now(), "[Driver] Unmask IRQ again");
    }
}
