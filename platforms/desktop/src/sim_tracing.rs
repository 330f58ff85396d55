use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Targets, prelude::*};

#[derive(Debug, clap::Args)]
pub struct TracingOpts {
    /// a comma-separated list of `tracing` targets and levels to enable.
    ///
    /// for example, `info,wlansim::tasks=debug,wlansim::retry=trace` will
    /// enable:
    ///
    /// - the `INFO` level globally (regardless of module path),
    /// - the `DEBUG` level for the driver and firmware tasks,
    /// - and the `TRACE` level for TX backoff.
    ///
    /// see <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/targets/struct.Targets.html#filtering-with-targets>
    /// for more details on this syntax.
    #[arg(
        short,
        long = "trace",
        env = "WLANSIM_TRACE",
        default_value_t = Targets::new().with_default(LevelFilter::INFO),
    )]
    pub trace_filter: Targets,
}

impl TracingOpts {
    pub fn setup_tracing(&self) {
        let fmt = tracing_subscriber::fmt::layer()
            .with_target(false)
            .without_time()
            .with_filter(self.trace_filter.clone());
        tracing_subscriber::registry().with(fmt).init();
    }
}
