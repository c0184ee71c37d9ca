//! Command-line parsing for the price-impact study.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! estimation code; `app` turns these structs into plain config values.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::SimulateKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "lmp",
    version,
    about = "Policy impact on day-ahead electricity prices (synthetic control + panel DiD)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Synthetic control for the treated zone, with placebo inference.
    Synth(SynthArgs),
    /// Difference-in-differences panel regressions over the specification menu.
    Panel(PanelArgs),
    /// Write a simulated input table with a known policy effect.
    Simulate(SimulateArgs),
}

/// Options for the synthetic-control pipeline.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Hourly price CSV (date, hr_end, zone, treated, post, da_lmp).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Directory for charts.
    #[arg(long, default_value = "results_synth")]
    pub results_dir: PathBuf,

    /// First peak hour-ending (inclusive).
    #[arg(long, default_value_t = *crate::synth::DEFAULT_PEAK_HOURS.start())]
    pub peak_start: u32,

    /// Last peak hour-ending (inclusive).
    #[arg(long, default_value_t = *crate::synth::DEFAULT_PEAK_HOURS.end())]
    pub peak_end: u32,

    /// Ridge penalty for donor weights.
    #[arg(long, default_value_t = crate::synth::DEFAULT_ALPHA)]
    pub alpha: f64,

    /// Policy start date (YYYY-MM-DD). Defaults to the earliest date flagged post = 1.
    #[arg(long, value_parser = parse_cli_date)]
    pub cutover: Option<NaiveDate>,

    /// Skip chart rendering.
    #[arg(long)]
    pub no_charts: bool,

    /// Export weights, effect series and inference to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

/// Options for the panel pipeline.
#[derive(Debug, Parser, Clone)]
pub struct PanelArgs {
    /// Monthly panel CSV (zone, month, treated, post, avg_price, load, natural_gas_price, weather).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Directory for CSV exports, text reports and charts.
    #[arg(long, default_value = "results_panel")]
    pub results_dir: PathBuf,

    /// Control zone kept in the restricted sample. Defaults to the first control zone by name.
    #[arg(long)]
    pub compare_zone: Option<String>,

    /// Skip chart rendering.
    #[arg(long)]
    pub no_charts: bool,
}

/// Options for the simulator.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Table to generate.
    #[arg(value_enum)]
    pub kind: SimulateKind,

    /// Output CSV path.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of control zones.
    #[arg(long, default_value_t = 4)]
    pub control_zones: usize,

    /// First simulated date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_cli_date)]
    pub start: Option<NaiveDate>,

    /// Policy start (YYYY-MM-DD).
    #[arg(long, value_parser = parse_cli_date)]
    pub cutover: Option<NaiveDate>,

    /// Number of periods (days for hourly, months for panel). Defaults to 730 / 36.
    #[arg(long)]
    pub periods: Option<usize>,

    /// Additive policy effect on the treated zone ($/MWh).
    #[arg(long, default_value_t = 8.0)]
    pub effect: f64,

    /// Noise standard deviation ($/MWh).
    #[arg(long, default_value_t = 2.0)]
    pub noise: f64,
}

fn parse_cli_date(s: &str) -> Result<NaiveDate, String> {
    crate::io::ingest::parse_date(s.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synth_defaults() {
        let cli = Cli::parse_from(["lmp", "synth", "--input", "prices.csv"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.peak_start, 17);
        assert_eq!(args.peak_end, 20);
        assert_eq!(args.alpha, 1.0);
        assert!(args.cutover.is_none());
        assert!(!args.no_charts);
    }

    #[test]
    fn cutover_is_parsed_as_date() {
        let cli = Cli::parse_from(["lmp", "synth", "-i", "p.csv", "--cutover", "2022-05-01"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.cutover, NaiveDate::from_ymd_opt(2022, 5, 1));
    }

    #[test]
    fn simulate_takes_kind_positionally() {
        let cli = Cli::parse_from(["lmp", "simulate", "panel", "-o", "out.csv", "--seed", "3"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.kind, SimulateKind::Panel);
        assert_eq!(args.seed, 3);
    }

    #[test]
    fn bad_date_is_rejected() {
        assert!(Cli::try_parse_from(["lmp", "synth", "-i", "p.csv", "--cutover", "soon"]).is_err());
    }
}
