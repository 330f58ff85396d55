//! # wlansim
//!
//! A simulation of a Wi-Fi host driver and its device firmware exchanging
//! packets through a pair of descriptor rings.
//!
//! ```text
//!  TxPath ──push──▶ TX ring ──pop──▶ Firmware ──push──▶ RX ring ──pop──▶ BottomHalf
//!                                       │                                  ▲
//!                                       └──────────── doorbell ────────────┘
//!                                               (dropped while masked)
//! ```
//!
//! ## Shared state
//!
//! Everything the three tasks share lives in one [`SimContext`], created when
//! a [`Simulation`] is built and dropped with it:
//!
//! * the TX and RX [`DescriptorRing`]s, each behind its own async mutex. A
//!   ring's indices and slots are only touched with that ring's lock held,
//!   and no task holds a ring lock across a sleep;
//! * the [`Doorbell`] and [`IrqMask`](doorbell::IrqMask);
//! * the [`PowerTracker`](power::PowerTracker);
//! * the simulated [`Clock`], which tasks advance as they spend time;
//! * the [`PacketPool`] every packet is allocated from, and the run's
//!   [`Stats`](stats::Stats).
//!
//! ## Running
//!
//! [`Simulation::run`] spawns the [`TxPath`], [`Firmware`] and [`BottomHalf`]
//! tasks and supervises them until the simulated clock reaches the requested
//! deadline, or until a task hits a fatal error (such as running out of
//! packet buffers). Each task also exposes a single-iteration `step()`, so the
//! protocol can be driven one move at a time.

pub mod clock;
pub mod config;
pub mod doorbell;
mod error;
pub mod packet;
pub mod pool;
pub mod power;
pub mod retry;
pub mod stats;
pub mod tasks;
#[cfg(test)]
pub(crate) mod test_util;

pub use self::{
    clock::Clock,
    config::{SimSettings, SimSettingsOverrides, TxFullPolicy},
    doorbell::Doorbell,
    error::SimError,
    packet::Packet,
    pool::{PacketPool, PooledPacket},
    tasks::{BottomHalf, Firmware, TxPath},
};
pub use descring::{DescriptorRing, Empty, Full};

use crate::{doorbell::IrqMask, power::PowerState, power::PowerTracker, stats::Stats};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tokio::{sync::Mutex, task::JoinSet};
use tracing::Instrument;

/// A descriptor ring together with the lock that guards it.
pub type SharedRing = Mutex<DescriptorRing<PooledPacket>>;

pub struct SimContext {
    settings: SimSettings,
    tx_ring: SharedRing,
    rx_ring: SharedRing,
    doorbell: Doorbell,
    irq: IrqMask,
    power: PowerTracker,
    clock: Clock,
    pool: PacketPool,
    stats: Stats,
}

#[derive(Debug)]
pub struct Simulation {
    ctx: Arc<SimContext>,
}

/// The state of a simulation when it stopped.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub sim_ms: u64,
    pub power: PowerState,
    pub stats: stats::StatsSnapshot,
    /// Sequence numbers still waiting in the TX ring.
    pub tx_pending: Vec<u32>,
    /// ACKs sitting in the RX ring with no wakeup to retire them.
    pub rx_stranded: Vec<u32>,
    /// The most recently retired ACKs, oldest first.
    pub retired: Vec<u32>,
    pub packets_outstanding: usize,
    pub pool_high_water: usize,
}

// === impl SimContext ===

impl SimContext {
    pub fn new(settings: SimSettings) -> Result<Arc<Self>, SimError> {
        settings.validate()?;
        Ok(Arc::new(Self {
            tx_ring: Mutex::new(DescriptorRing::with_capacity(settings.ring_capacity)),
            rx_ring: Mutex::new(DescriptorRing::with_capacity(settings.ring_capacity)),
            doorbell: Doorbell::new(),
            irq: IrqMask::new(),
            power: PowerTracker::new(),
            clock: Clock::new(settings.tick),
            pool: PacketPool::new(settings.pool_capacity),
            stats: Stats::new(),
            settings,
        }))
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    /// Driver to firmware.
    pub fn tx_ring(&self) -> &SharedRing {
        &self.tx_ring
    }

    /// Firmware to driver.
    pub fn rx_ring(&self) -> &SharedRing {
        &self.rx_ring
    }

    pub fn doorbell(&self) -> &Doorbell {
        &self.doorbell
    }

    pub fn irq(&self) -> &IrqMask {
        &self.irq
    }

    pub fn power(&self) -> &PowerTracker {
        &self.power
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn pool(&self) -> &PacketPool {
        &self.pool
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub async fn report(&self) -> SimReport {
        let sequences = |ring: &DescriptorRing<PooledPacket>| -> Vec<u32> {
            ring.iter().map(|pkt| pkt.sequence()).collect()
        };
        let tx_pending = sequences(&*self.tx_ring.lock().await);
        let rx_stranded = sequences(&*self.rx_ring.lock().await);

        SimReport {
            sim_ms: self.clock.now(),
            power: self.power.state(),
            stats: self.stats.snapshot(),
            tx_pending,
            rx_stranded,
            retired: self.stats.retired(),
            packets_outstanding: self.pool.outstanding(),
            pool_high_water: self.pool.high_water(),
        }
    }
}

impl fmt::Debug for SimContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimContext")
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .field("doorbell", &self.doorbell)
            .field("irq_masked", &self.irq.is_masked())
            .field("power", &self.power.state())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

// === impl Simulation ===

impl Simulation {
    pub fn new(settings: SimSettings) -> Result<Self, SimError> {
        Ok(Self {
            ctx: SimContext::new(settings)?,
        })
    }

    pub fn context(&self) -> &Arc<SimContext> {
        &self.ctx
    }

    /// Run the driver, firmware and bottom-half tasks until the simulated
    /// clock reaches `until_ms`, or forever if `None`.
    ///
    /// Returns early with the error of the first task that fails; the other
    /// tasks are aborted.
    pub async fn run(&self, until_ms: Option<u64>) -> Result<SimReport, SimError> {
        let ctx = &self.ctx;
        let mut tasks = JoinSet::new();
        tasks.spawn(
            TxPath::new(ctx.clone())
                .run()
                .instrument(tracing::info_span!("DrvTX", priority = TxPath::PRIORITY)),
        );
        tasks.spawn(
            Firmware::new(ctx.clone())
                .run()
                .instrument(tracing::info_span!("FW", priority = Firmware::PRIORITY)),
        );
        tasks.spawn(
            BottomHalf::new(ctx.clone())
                .run()
                .instrument(tracing::info_span!("DrvBH", priority = BottomHalf::PRIORITY)),
        );
        tracing::info!(
            t_ms = ctx.clock.now(),
            settings = ?ctx.settings,
            ?until_ms,
            "=== Wi-Fi driver/firmware simulation started ===",
        );

        let deadline = async {
            match until_ms {
                Some(deadline) => ctx.clock.wait_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                joined = tasks.join_next() => match joined {
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(error))) => {
                        tracing::error!(t_ms = ctx.clock.now(), %error, "fatal error, stopping simulation");
                        tasks.shutdown().await;
                        return Err(error);
                    }
                    Some(Err(join_error)) => {
                        let error = SimError::TaskFailed(join_error.to_string());
                        tracing::error!(t_ms = ctx.clock.now(), %error, "task failed, stopping simulation");
                        tasks.shutdown().await;
                        return Err(error);
                    }
                    None => break,
                },
            }
        }

        tasks.shutdown().await;
        let report = ctx.report().await;
        tracing::info!(t_ms = report.sim_ms, "=== simulation stopped ===");
        Ok(report)
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            sim_ms,
            power,
            stats,
            tx_pending,
            rx_stranded,
            retired,
            packets_outstanding,
            pool_high_water,
        } = self;
        writeln!(f, "simulated time:     {sim_ms} ms")?;
        writeln!(f, "power state:        {power}")?;
        writeln!(
            f,
            "TX:                 {} pushed, {} full, {} retried, {} dropped, {} critical sections",
            stats.tx_pushed, stats.tx_full, stats.tx_retries, stats.tx_dropped, stats.irq_masks
        )?;
        writeln!(
            f,
            "firmware:           {} processed, {} ACKs pushed, {} ACKs dropped",
            stats.fw_processed, stats.acks_pushed, stats.rx_dropped
        )?;
        writeln!(
            f,
            "doorbell:           {} delivered, {} coalesced, {} dropped while masked",
            stats.doorbell_delivered, stats.doorbell_coalesced, stats.doorbell_masked
        )?;
        writeln!(
            f,
            "bottom half:        {} wakes, {} ACKs retired, {} empty wakes",
            stats.bh_wakes, stats.acks_retired, stats.empty_wakes
        )?;
        writeln!(
            f,
            "power transitions:  {} into power-save, {} wakes",
            stats.power_save_entries, stats.power_wakes
        )?;
        writeln!(f, "TX ring pending:    {tx_pending:?}")?;
        writeln!(f, "RX ring stranded:   {rx_stranded:?}")?;
        writeln!(f, "last retired:       {:?}", last(retired, 16))?;
        write!(
            f,
            "packets:            {packets_outstanding} outstanding, {pool_high_water} at most"
        )
    }
}

fn last(seqs: &[u32], n: usize) -> &[u32] {
    &seqs[seqs.len().saturating_sub(n)..]
}
