//! Synthetic input tables with a known policy effect.
//!
//! Every zone follows a shared market factor with its own loading and offset;
//! the treated zone's loading is the mean of the control loadings, so a donor
//! combination can reproduce it before the cutover. After the cutover the
//! treated zone gets a constant additive `effect`.

use chrono::{Datelike, Days, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::info;

use crate::domain::{Observation, PanelRow, SimulateConfig, SimulateKind, YearMonth};
use crate::error::{AppError, EXIT_INPUT, EXIT_NUMERIC};
use crate::io::export::{write_hourly_input, write_panel_input};

/// Name of the simulated treated zone.
pub const TREATED_ZONE: &str = "Zone F";

/// Control zone letters (F is reserved for the treated zone).
const CONTROL_LETTERS: &str = "ABCDEGHIJKLMNOPQRSTUVWXYZ";

/// Relative price level for each hour-ending 1..=24 (evening peak).
fn hour_shape(hour: u32) -> f64 {
    match hour {
        1..=6 => 0.75,
        7..=10 => 1.0,
        11..=16 => 1.05,
        17..=20 => 1.4,
        _ => 0.9,
    }
}

fn validate(config: &SimulateConfig) -> Result<(), AppError> {
    if config.control_zones == 0 || config.control_zones > CONTROL_LETTERS.len() {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("Control zone count must be in 1..={}.", CONTROL_LETTERS.len()),
        ));
    }
    if config.periods == 0 {
        return Err(AppError::new(EXIT_INPUT, "Period count must be > 0."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(EXIT_INPUT, "Noise must be finite and non-negative."));
    }
    if !config.effect.is_finite() {
        return Err(AppError::new(EXIT_INPUT, "Effect must be finite."));
    }
    Ok(())
}

fn control_names(n: usize) -> Vec<String> {
    CONTROL_LETTERS.chars().take(n).map(|c| format!("Zone {c}")).collect()
}

/// (name, loading, offset, treated) for every zone, treated zone last.
fn zone_profiles(rng: &mut StdRng, n_controls: usize) -> Vec<(String, f64, f64, bool)> {
    let mut zones: Vec<(String, f64, f64, bool)> = control_names(n_controls)
        .into_iter()
        .map(|name| (name, rng.gen_range(0.7..1.3), rng.gen_range(-5.0..5.0), false))
        .collect();
    let n = zones.len() as f64;
    let loading = zones.iter().map(|z| z.1).sum::<f64>() / n;
    let offset = zones.iter().map(|z| z.2).sum::<f64>() / n;
    zones.push((TREATED_ZONE.to_string(), loading, offset, true));
    zones
}

/// Hourly prices for `periods` days starting at `start`.
pub fn simulate_hourly(config: &SimulateConfig) -> Result<Vec<Observation>, AppError> {
    validate(config)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise.max(f64::MIN_POSITIVE))
        .map_err(|e| AppError::new(EXIT_NUMERIC, format!("Noise distribution error: {e}")))?;
    let shock = Normal::new(0.0, 3.0)
        .map_err(|e| AppError::new(EXIT_NUMERIC, format!("Market shock distribution error: {e}")))?;
    let zones = zone_profiles(&mut rng, config.control_zones);

    let mut out = Vec::with_capacity(config.periods * 24 * zones.len());
    let mut market = 40.0;
    for d in 0..config.periods {
        let date = config
            .start
            .checked_add_days(Days::new(d as u64))
            .ok_or_else(|| AppError::new(EXIT_INPUT, "Simulated date range overflows."))?;
        let season = 8.0 * (2.0 * std::f64::consts::PI * date.ordinal() as f64 / 365.25).cos();
        // Mean-reverting daily market level.
        market = 40.0 + 0.8 * (market - 40.0) + shock.sample(&mut rng);
        let post = date >= config.cutover;

        for (zone, loading, offset, treated) in &zones {
            for hour in 1..=24 {
                let mut price = offset + loading * (market + season) * hour_shape(hour);
                if config.noise > 0.0 {
                    price += noise.sample(&mut rng);
                }
                if *treated && post {
                    price += config.effect;
                }
                out.push(Observation {
                    date,
                    zone: zone.clone(),
                    hour,
                    treated: *treated,
                    post,
                    price,
                });
            }
        }
    }
    Ok(out)
}

/// Monthly zone panel for `periods` months starting at `start`'s month.
pub fn simulate_panel(config: &SimulateConfig) -> Result<Vec<PanelRow>, AppError> {
    validate(config)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise.max(f64::MIN_POSITIVE))
        .map_err(|e| AppError::new(EXIT_NUMERIC, format!("Noise distribution error: {e}")))?;
    let zones = zone_profiles(&mut rng, config.control_zones);
    let cutover = YearMonth::from_date(config.cutover);

    let mut out = Vec::with_capacity(config.periods * zones.len());
    let mut month = YearMonth::from_date(config.start);
    let mut gas: f64 = 4.0;
    for t in 0..config.periods {
        gas = (gas + rng.gen_range(-0.4..0.4)).max(1.5);
        let season = (2.0 * std::f64::consts::PI * month.month as f64 / 12.0).cos();
        let post = month >= cutover;

        for (zone, loading, offset, treated) in &zones {
            let load = 1500.0 * loading + 200.0 * season + rng.gen_range(-50.0..50.0);
            let weather = 55.0 - 20.0 * season + rng.gen_range(-3.0..3.0);
            // Hub basis keeps the gas price zone-specific.
            let gas_price = gas + rng.gen_range(-0.3..0.3);
            let mut price = 20.0 + offset + 0.01 * load + 3.0 * gas_price + 0.2 * t as f64;
            if config.noise > 0.0 {
                price += noise.sample(&mut rng);
            }
            if *treated && post {
                price += config.effect;
            }
            out.push(PanelRow {
                zone: zone.clone(),
                month,
                treated: *treated,
                post,
                price,
                load,
                gas_price,
                weather,
            });
        }
        month = next_month(month);
    }
    Ok(out)
}

fn next_month(m: YearMonth) -> YearMonth {
    if m.month == 12 {
        YearMonth { year: m.year + 1, month: 1 }
    } else {
        YearMonth { year: m.year, month: m.month + 1 }
    }
}

/// Generate the requested table and write it to `config.output`.
pub fn run_simulation(config: &SimulateConfig) -> Result<usize, AppError> {
    let rows = match config.kind {
        SimulateKind::Hourly => write_hourly_input(&config.output, &simulate_hourly(config)?)?,
        SimulateKind::Panel => write_panel_input(&config.output, &simulate_panel(config)?)?,
    };
    info!(
        kind = ?config.kind,
        rows,
        seed = config.seed,
        start = %config.start,
        cutover = %config.cutover,
        "simulated input written"
    );
    Ok(rows)
}

/// Default simulation start date.
pub fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Default simulated policy start.
pub fn default_cutover() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 5, 1).unwrap_or(NaiveDate::MIN)
}
