use crate::{packet::DESC_LEN, Packet, SimContext, SimSettings};
use std::{sync::Arc, time::Duration};

/// Settings for driving the tasks by hand: a fast clock, and no periodic
/// critical section unless a test asks for one.
pub(crate) fn settings() -> SimSettings {
    SimSettings::default()
        .with_tick(Duration::from_micros(10))
        .with_mask_every(0)
}

pub(crate) fn context(settings: SimSettings) -> Arc<SimContext> {
    trace_init();
    SimContext::new(settings).expect("test settings must be valid")
}

/// Push a TX packet straight into the TX ring, as if the TX path had.
pub(crate) async fn push_tx(ctx: &SimContext, seq: u32) {
    let pkt = ctx
        .pool()
        .alloc(Packet::tx(seq))
        .expect("test pool must not run dry");
    if ctx.tx_ring().lock().await.push(pkt, DESC_LEN).is_err() {
        panic!("TX ring unexpectedly full pushing packet #{seq}");
    }
}

pub(crate) async fn rx_sequences(ctx: &SimContext) -> Vec<u32> {
    ctx.rx_ring()
        .lock()
        .await
        .iter()
        .map(|pkt| pkt.sequence())
        .collect()
}

pub(crate) fn trace_init() {
    use tracing_subscriber::{
        filter::{EnvFilter, LevelFilter},
        prelude::*,
    };
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into());
    let filter = if env.is_empty() {
        builder.parse("wlansim=debug").unwrap()
    } else {
        builder.parse_lossy(env)
    };

    let _res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .without_time()
        .finish()
        .try_init();
}
