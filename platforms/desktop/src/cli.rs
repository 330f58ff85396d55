use crate::sim_tracing;
use clap::Parser;
use std::path::PathBuf;
use wlansim::{SimSettingsOverrides, TxFullPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Path to a TOML file of simulation settings.
    ///
    /// Settings given on the command line take precedence over the file.
    #[arg(short, long, env = "WLANSIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop once the simulated clock reaches this many milliseconds.
    ///
    /// If unset, the simulation runs until interrupted or until it hits a
    /// fatal error.
    #[arg(long)]
    pub run_for_ms: Option<u64>,

    #[command(flatten)]
    pub sim: SimOptions,

    #[command(flatten)]
    pub tracing: sim_tracing::TracingOpts,
}

#[derive(Debug, clap::Args)]
pub struct SimOptions {
    /// Slots per descriptor ring (one always stays empty).
    #[arg(long)]
    pub ring_capacity: Option<usize>,

    /// Maximum number of packet buffers alive at once.
    #[arg(long)]
    pub pool_capacity: Option<usize>,

    /// Simulated milliseconds between TX packets.
    #[arg(long)]
    pub tx_period_ms: Option<u64>,

    /// Simulated firmware processing time per packet.
    #[arg(long)]
    pub fw_proc_ms: Option<u64>,

    /// Idle time after which the firmware enters power-save.
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,

    /// Firmware poll interval while the TX ring is empty.
    #[arg(long)]
    pub idle_poll_ms: Option<u64>,

    /// Mask interrupts after every Nth TX packet (0 disables).
    #[arg(long)]
    pub mask_every: Option<u32>,

    /// How long the TX critical section keeps interrupts masked.
    #[arg(long)]
    pub mask_hold_ms: Option<u64>,

    /// Real microseconds per simulated millisecond.
    #[arg(long)]
    pub tick_us: Option<u64>,

    /// Stop producing TX packets after this many.
    #[arg(long)]
    pub tx_packet_limit: Option<u32>,

    /// What the TX path does with a packet the TX ring rejects.
    #[arg(long, value_enum)]
    pub tx_full: Option<TxFull>,

    /// With `--tx-full retry`: retries before the packet is dropped.
    /// Defaults to 3
    #[arg(long, requires = "tx_full")]
    pub tx_max_retries: Option<u32>,

    /// With `--tx-full retry`: the first backoff, doubled on each retry.
    /// Defaults to 10
    #[arg(long, requires = "tx_full")]
    pub tx_backoff_ms: Option<u64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum TxFull {
    /// Free the packet.
    Drop,
    /// Back off and push it again.
    Retry,
}

impl SimOptions {
    const DEFAULT_TX_MAX_RETRIES: u32 = 3;
    const DEFAULT_TX_BACKOFF_MS: u64 = 10;

    pub fn overrides(&self) -> SimSettingsOverrides {
        SimSettingsOverrides {
            ring_capacity: self.ring_capacity,
            pool_capacity: self.pool_capacity,
            tx_period_ms: self.tx_period_ms,
            mask_every: self.mask_every,
            mask_hold_ms: self.mask_hold_ms,
            fw_proc_ms: self.fw_proc_ms,
            idle_timeout_ms: self.idle_timeout_ms,
            idle_poll_ms: self.idle_poll_ms,
            tick_us: self.tick_us,
            tx_full: self.tx_full.map(|policy| match policy {
                TxFull::Drop => TxFullPolicy::Drop,
                TxFull::Retry => TxFullPolicy::Retry {
                    max_retries: self
                        .tx_max_retries
                        .unwrap_or(Self::DEFAULT_TX_MAX_RETRIES),
                    backoff_ms: self
                        .tx_backoff_ms
                        .unwrap_or(Self::DEFAULT_TX_BACKOFF_MS),
                },
            }),
            tx_packet_limit: self.tx_packet_limit,
        }
    }
}
