//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments into config structs
//! - runs the synthetic-control or panel pipeline
//! - prints the headline results

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, PanelArgs, SimulateArgs, SynthArgs};
use crate::domain::{PanelConfig, SimulateConfig, SimulateKind, SynthConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `lmp` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Synth(args) => handle_synth(args),
        Command::Panel(args) => handle_panel(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore the error when a subscriber is already installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = synth_config_from_args(&args);
    let run = pipeline::run_synth(&config)?;

    println!(
        "{}",
        crate::report::format_synth_summary(&run.treated, &run.inference)
    );
    Ok(())
}

fn handle_panel(args: PanelArgs) -> Result<(), AppError> {
    let config = panel_config_from_args(&args);
    let run = pipeline::run_panel(&config)?;

    println!("{}", crate::report::format_comparison_table(&run.runs));
    println!(
        "{}",
        crate::report::format_interpretation(
            crate::report::best_by_r_squared(&run.runs),
            &run.full.treated_zones().join(", "),
        )
    );
    println!("Results written to {}", config.results_dir.display());
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = simulate_config_from_args(&args);
    let rows = crate::data::run_simulation(&config)?;
    println!("Wrote {rows} rows to {}", config.output.display());
    Ok(())
}

pub fn synth_config_from_args(args: &SynthArgs) -> SynthConfig {
    SynthConfig {
        input: args.input.clone(),
        results_dir: args.results_dir.clone(),
        peak_start: args.peak_start,
        peak_end: args.peak_end,
        alpha: args.alpha,
        cutover: args.cutover,
        charts: !args.no_charts,
        export_json: args.export_json.clone(),
    }
}

pub fn panel_config_from_args(args: &PanelArgs) -> PanelConfig {
    PanelConfig {
        input: args.input.clone(),
        results_dir: args.results_dir.clone(),
        compare_zone: args.compare_zone.clone(),
        charts: !args.no_charts,
    }
}

pub fn simulate_config_from_args(args: &SimulateArgs) -> SimulateConfig {
    let default_periods = match args.kind {
        SimulateKind::Hourly => 730,
        SimulateKind::Panel => 36,
    };
    SimulateConfig {
        kind: args.kind,
        output: args.output.clone(),
        seed: args.seed,
        control_zones: args.control_zones,
        start: args.start.unwrap_or_else(crate::data::default_start),
        cutover: args.cutover.unwrap_or_else(crate::data::default_cutover),
        periods: args.periods.unwrap_or(default_periods),
        effect: args.effect,
        noise: args.noise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn simulate_periods_default_per_kind() {
        let cli = Cli::parse_from(["lmp", "simulate", "hourly", "-o", "h.csv"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let config = simulate_config_from_args(&args);
        assert_eq!(config.periods, 730);
        assert_eq!(config.start, crate::data::default_start());

        let cli = Cli::parse_from(["lmp", "simulate", "panel", "-o", "p.csv", "--periods", "12"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(simulate_config_from_args(&args).periods, 12);
    }

    #[test]
    fn no_charts_flag_disables_charts() {
        let cli = Cli::parse_from(["lmp", "panel", "-i", "p.csv", "--no-charts", "--compare-zone", "Zone B"]);
        let Command::Panel(args) = cli.command else {
            panic!("expected panel");
        };
        let config = panel_config_from_args(&args);
        assert!(!config.charts);
        assert_eq!(config.compare_zone.as_deref(), Some("Zone B"));
    }
}
