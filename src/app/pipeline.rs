//! The two estimation pipelines, end to end.
//!
//! Keeping them here (rather than in `app.rs`) lets tests drive a full run
//! without going through argv:
//! - synth: load -> peak aggregation -> donor weights -> effect -> placebos -> inference
//! - panel: load -> panel build -> specification menu -> comparison report

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{DonorWeights, EffectSeries, PanelConfig, SynthConfig};
use crate::error::{AppError, EXIT_DATA, EXIT_INPUT};
use crate::io::export::{ensure_results_dir, write_json, write_panel_csv, write_text};
use crate::panel::{Panel, SpecRun, build_panel, run_all};
use crate::plot::{
    control_trend_chart, did_comparison_bars, price_trends_chart, render_bar_chart, render_time_chart,
    synthetic_control_chart, treatment_gap_chart, zone_price_chart,
};
use crate::report::{PanelContext, best_by_r_squared, format_panel_summary, format_regression_results};
use crate::synth::{
    Inference, PlaceboRun, SyntheticControl, aggregate_peak, control_zones, fit_synthetic_control, infer_cutover,
    run_placebos, summarize, treated_zone,
};

/// All computed outputs of a single `lmp synth` run.
#[derive(Debug, Clone)]
pub struct SynthOutput {
    pub treated: SyntheticControl,
    pub controls: Vec<String>,
    pub placebos: Vec<PlaceboRun>,
    pub inference: Inference,
}

#[derive(Debug, Serialize)]
struct PlaceboExport<'a> {
    zone: &'a str,
    status: &'static str,
    average_post_gap: Option<f64>,
    reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SynthExport<'a> {
    treated_zone: &'a str,
    weights: &'a DonorWeights,
    series: &'a EffectSeries,
    inference: &'a Inference,
    placebos: Vec<PlaceboExport<'a>>,
}

/// Execute the synthetic-control pipeline and write its artifacts.
pub fn run_synth(config: &SynthConfig) -> Result<SynthOutput, AppError> {
    // 1) Load and aggregate to one peak price per (date, zone).
    let observations = crate::io::ingest::load_observations(&config.input)?;
    let peak = aggregate_peak(&observations, config.peak_start..=config.peak_end)?;
    info!(
        hourly_rows = observations.len(),
        peak_rows = peak.len(),
        "peak prices aggregated"
    );

    // 2) Identify the treated unit and the donor pool.
    let treated_name = treated_zone(&peak)?;
    let controls = control_zones(&peak);
    if controls.is_empty() {
        return Err(AppError::new(EXIT_DATA, "No control zones in input."));
    }
    let cutover = match config.cutover {
        Some(date) => date,
        None => infer_cutover(&peak)?,
    };
    info!(treated = %treated_name, controls = controls.len(), %cutover, "donor pool ready");

    // 3) Synthetic control for the treated zone.
    let treated = fit_synthetic_control(&peak, &treated_name, &controls, cutover, config.alpha)?;
    info!(
        zone = %treated.zone,
        average_post_gap = treated.average_post_gap,
        dropped_dates = treated.series.dropped_dates,
        "treated zone fitted"
    );

    // 4) Placebo loop and permutation inference.
    let placebos = run_placebos(&peak, &controls, cutover, config.alpha);
    let inference = summarize(treated.average_post_gap, &placebos);

    // 5) Artifacts.
    if config.charts {
        ensure_results_dir(&config.results_dir)?;
        render_time_chart(
            &config.results_dir.join("synthetic_control.svg"),
            &synthetic_control_chart(&treated.zone, &treated.series),
        )?;
        render_time_chart(
            &config.results_dir.join("treatment_gap.svg"),
            &treatment_gap_chart(&treated.zone, &treated.series),
        )?;
    }
    if let Some(path) = &config.export_json {
        let export = SynthExport {
            treated_zone: &treated.zone,
            weights: &treated.weights,
            series: &treated.series,
            inference: &inference,
            placebos: placebos
                .iter()
                .map(|p| PlaceboExport {
                    zone: &p.zone,
                    status: p.outcome.status(),
                    average_post_gap: p.outcome.ok().map(|fit| fit.average_post_gap),
                    reason: p.outcome.reason(),
                })
                .collect(),
        };
        write_json(path, &export)?;
    }

    Ok(SynthOutput {
        treated,
        controls,
        placebos,
        inference,
    })
}

/// All computed outputs of a single `lmp panel` run.
#[derive(Debug, Clone)]
pub struct PanelOutput {
    pub full: Panel,
    pub restricted: Panel,
    pub compare_zone: String,
    pub runs: Vec<SpecRun>,
    pub summary: String,
}

/// Execute the panel DiD pipeline and write its artifacts.
pub fn run_panel(config: &PanelConfig) -> Result<PanelOutput, AppError> {
    // 1) Load and build the full panel.
    let rows = crate::io::ingest::load_panel_rows(&config.input)?;
    let full = build_panel(&rows)?;

    // 2) Restricted sample: treated zones plus one comparison zone.
    let controls = full.control_zones();
    let compare_zone = match &config.compare_zone {
        Some(zone) if controls.contains(zone) => zone.clone(),
        Some(zone) => {
            return Err(AppError::new(
                EXIT_INPUT,
                format!(
                    "Comparison zone {zone} is not a control zone (controls: {}).",
                    controls.join(", ")
                ),
            ));
        }
        None => controls
            .first()
            .cloned()
            .ok_or_else(|| AppError::new(EXIT_DATA, "No control zones in input."))?,
    };
    let mut keep = full.treated_zones();
    keep.push(compare_zone.clone());
    let restricted = full.restrict(&keep)?;
    info!(compare_zone = %compare_zone, observations = restricted.len(), "restricted panel built");

    // 3) Specification menu.
    let runs = run_all(&full, &restricted);

    // 4) Reports.
    let ctx = PanelContext {
        n_obs: full.len(),
        treated_zones: full.treated_zones(),
        control_zones: controls,
        compare_zone: compare_zone.clone(),
        treatment_start: full.treatment_start(),
        group_sizes: full.group_sizes(),
    };
    let summary = format_panel_summary(&ctx, &runs);

    let dir = &config.results_dir;
    ensure_results_dir(dir)?;
    write_panel_csv(&dir.join("panel_data_all.csv"), &full.observations)?;
    write_panel_csv(&dir.join("panel_data_restricted.csv"), &restricted.observations)?;
    write_text(&dir.join("panel_regression_results.txt"), &format_regression_results(&runs))?;
    write_text(&dir.join("panel_analysis_summary.txt"), &summary)?;

    // 5) Charts.
    if config.charts {
        let bars = did_comparison_bars(&runs);
        if bars.is_empty() {
            warn!("no specification was estimated; skipping did_coefficient_comparison.svg");
        } else {
            render_bar_chart(
                &dir.join("did_coefficient_comparison.svg"),
                "DiD Coefficient by Model Specification",
                "DiD coefficient ($/MWh)",
                &bars,
            )?;
        }
        render_time_chart(&dir.join("price_trends.svg"), &price_trends_chart(&full))?;
        render_time_chart(
            &dir.join("price_trends_restricted.svg"),
            &zone_price_chart(&restricted, "Average Price: Treated vs Comparison Zone"),
        )?;
        render_time_chart(
            &dir.join("load_trend.svg"),
            &control_trend_chart(&full, "load", |o| o.load),
        )?;
        render_time_chart(
            &dir.join("natural_gas_price_trend.svg"),
            &control_trend_chart(&full, "natural_gas_price", |o| o.gas_price),
        )?;
        render_time_chart(
            &dir.join("weather_trend.svg"),
            &control_trend_chart(&full, "weather", |o| o.weather),
        )?;
    }

    if let Some(best) = best_by_r_squared(&runs) {
        info!(spec = best.spec.name, r_squared = best.r_squared, did = best.did_coef, "best specification");
    }

    Ok(PanelOutput {
        full,
        restricted,
        compare_zone,
        runs,
        summary,
    })
}
