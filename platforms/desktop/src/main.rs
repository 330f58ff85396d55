use clap::Parser;
use miette::{Context, IntoDiagnostic};
use wlansim::{SimSettings, Simulation};

mod cli;
mod config;
mod sim_tracing;

fn main() -> miette::Result<()> {
    let args = cli::Args::parse();
    args.tracing.setup_tracing();
    let settings = config::load(&args)?;
    let _span = tracing::info_span!("Wlansim").entered();
    run(settings, args.run_for_ms)
}

#[tokio::main(flavor = "current_thread")]
async fn run(settings: SimSettings, until_ms: Option<u64>) -> miette::Result<()> {
    let sim = Simulation::new(settings)
        .into_diagnostic()
        .wrap_err("failed to build simulation")?;

    println!("========================================");
    let report = tokio::select! {
        res = sim.run(until_ms) => res.into_diagnostic().wrap_err("simulation failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(t_ms = sim.context().clock().now(), "interrupted");
            sim.context().report().await
        }
    };
    println!("========================================");
    println!("{report}");
    Ok(())
}
