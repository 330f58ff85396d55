use crate::cli::Args;
use miette::{Context, IntoDiagnostic};
use std::path::Path;
use wlansim::{SimSettings, SimSettingsOverrides};

/// Build the simulation settings: command-line flags, then the config file
/// (if any), then the built-in defaults.
pub fn load(args: &Args) -> miette::Result<SimSettings> {
    let file = match args.config {
        Some(ref path) => from_file(path)?,
        None => SimSettingsOverrides::default(),
    };
    let settings = args.sim.overrides().or(file).into_settings();
    settings
        .validate()
        .into_diagnostic()
        .wrap_err("invalid simulation settings")?;
    Ok(settings)
}

fn from_file(path: &Path) -> miette::Result<SimSettingsOverrides> {
    let path_disp = path.display();
    (|| {
        let text = std::fs::read_to_string(path).into_diagnostic()?;
        toml::from_str::<SimSettingsOverrides>(&text).into_diagnostic()
    })()
    .wrap_err_with(|| format!("Failed to load config file '{path_disp}'"))
}
