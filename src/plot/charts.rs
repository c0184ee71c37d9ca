//! SVG charts for both pipelines.
//!
//! Chart descriptions are plain data (series + bounds) built outside the draw
//! call, so the data prep can be tested without touching the filesystem.
//! Dates are plotted as day offsets from the first date and formatted back
//! into `YYYY-MM-DD` tick labels.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Days, NaiveDate};
use plotters::prelude::*;
use tracing::debug;

use crate::domain::{EffectSeries, PanelObservation};
use crate::error::{AppError, EXIT_DATA, EXIT_INPUT};
use crate::panel::builder::Panel;
use crate::panel::estimator::SpecRun;

const SIZE: (u32, u32) = (1200, 600);
const BAR_SIZE: (u32, u32) = (1200, 800);

const PALETTE: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(214, 39, 40),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];
const MARKER: RGBColor = RGBColor(0, 128, 0);

/// One named line on a date axis.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedSeries {
    pub label: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// A multi-line chart over dates with an optional vertical marker.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeChart {
    pub title: String,
    pub y_label: String,
    pub series: Vec<DatedSeries>,
    pub marker: Option<(NaiveDate, String)>,
    /// Draw a horizontal line at zero.
    pub zero_line: bool,
}

/// One bar of a horizontal bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub highlight: bool,
}

/// Actual vs synthetic price with the cutover marked.
pub fn synthetic_control_chart(zone: &str, series: &EffectSeries) -> TimeChart {
    TimeChart {
        title: format!("Synthetic Control: {zone}"),
        y_label: "Peak-hour DA LMP ($/MWh)".to_string(),
        series: vec![
            DatedSeries {
                label: format!("Actual ({zone})"),
                points: series.points.iter().map(|p| (p.date, p.actual)).collect(),
            },
            DatedSeries {
                label: "Synthetic".to_string(),
                points: series.points.iter().map(|p| (p.date, p.synthetic)).collect(),
            },
        ],
        marker: Some((series.cutover, "Policy start".to_string())),
        zero_line: false,
    }
}

/// Actual minus synthetic over time.
pub fn treatment_gap_chart(zone: &str, series: &EffectSeries) -> TimeChart {
    TimeChart {
        title: format!("Treatment Gap: {zone}"),
        y_label: "Gap ($/MWh)".to_string(),
        series: vec![DatedSeries {
            label: "Actual - Synthetic".to_string(),
            points: series.points.iter().map(|p| (p.date, p.gap)).collect(),
        }],
        marker: Some((series.cutover, "Policy start".to_string())),
        zero_line: true,
    }
}

/// DiD coefficient of every fitted specification; significant ones highlighted.
pub fn did_comparison_bars(runs: &[SpecRun]) -> Vec<Bar> {
    runs.iter()
        .filter_map(|r| r.outcome.ok())
        .map(|r| Bar {
            label: r.spec.name.to_string(),
            value: r.did_coef,
            highlight: r.significant(),
        })
        .collect()
}

fn monthly_mean<'a>(
    obs: impl IntoIterator<Item = &'a PanelObservation>,
    value: impl Fn(&PanelObservation) -> f64,
) -> Vec<(NaiveDate, f64)> {
    let mut acc: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for o in obs {
        let e = acc.entry(o.month.first_day()).or_insert((0.0, 0));
        e.0 += value(o);
        e.1 += 1;
    }
    acc.into_iter().map(|(d, (s, n))| (d, s / n as f64)).collect()
}

fn treatment_marker(panel: &Panel) -> Option<(NaiveDate, String)> {
    panel
        .treatment_start()
        .map(|m| (m.first_day(), "Treatment date".to_string()))
}

/// Mean monthly price of treated vs control zones.
pub fn price_trends_chart(panel: &Panel) -> TimeChart {
    let obs = &panel.observations;
    TimeChart {
        title: "Average Price by Group Over Time".to_string(),
        y_label: "Average price ($/MWh)".to_string(),
        series: vec![
            DatedSeries {
                label: format!("Treatment ({})", panel.treated_zones().join(", ")),
                points: monthly_mean(obs.iter().filter(|o| o.treated), |o| o.price),
            },
            DatedSeries {
                label: "Control".to_string(),
                points: monthly_mean(obs.iter().filter(|o| !o.treated), |o| o.price),
            },
        ],
        marker: treatment_marker(panel),
        zero_line: false,
    }
}

/// Monthly price of each zone in a (restricted) panel.
pub fn zone_price_chart(panel: &Panel, title: &str) -> TimeChart {
    let mut zones: Vec<String> = panel.treated_zones();
    zones.extend(panel.control_zones());
    TimeChart {
        title: title.to_string(),
        y_label: "Average price ($/MWh)".to_string(),
        series: zones
            .into_iter()
            .map(|zone| DatedSeries {
                points: monthly_mean(panel.observations.iter().filter(|o| o.zone == zone), |o| o.price),
                label: zone,
            })
            .collect(),
        marker: treatment_marker(panel),
        zero_line: false,
    }
}

/// Monthly mean of one control variable across all zones.
pub fn control_trend_chart(panel: &Panel, name: &str, value: fn(&PanelObservation) -> f64) -> TimeChart {
    let pretty = name.replace('_', " ");
    TimeChart {
        title: format!("{pretty} Over Time"),
        y_label: pretty.clone(),
        series: vec![DatedSeries {
            label: pretty,
            points: monthly_mean(&panel.observations, value),
        }],
        marker: treatment_marker(panel),
        zero_line: false,
    }
}

fn draw_err(e: impl std::fmt::Display) -> AppError {
    AppError::new(EXIT_INPUT, format!("Failed to draw chart: {e}"))
}

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let span = (hi - lo).abs().max(1e-9);
    (lo - 0.05 * span, hi + 0.05 * span)
}

/// Render a [`TimeChart`] to an SVG file.
pub fn render_time_chart(path: &Path, chart: &TimeChart) -> Result<(), AppError> {
    let all = chart.series.iter().flat_map(|s| s.points.iter());
    let (Some(first), Some(last)) = (all.clone().map(|p| p.0).min(), all.clone().map(|p| p.0).max()) else {
        return Err(AppError::new(EXIT_DATA, format!("Chart '{}' has no data.", chart.title)));
    };
    let mut y_lo = all.clone().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let mut y_hi = all.map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    if chart.zero_line {
        y_lo = y_lo.min(0.0);
        y_hi = y_hi.max(0.0);
    }
    if !(y_lo.is_finite() && y_hi.is_finite()) {
        return Err(AppError::new(EXIT_DATA, format!("Chart '{}' has non-finite values.", chart.title)));
    }
    let (y0, y1) = padded(y_lo, y_hi);
    let x_of = |d: NaiveDate| (d - first).num_days() as f64;
    let (x0, x1) = padded(0.0, x_of(last));

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(draw_err)?;

    let date_label = |v: &f64| {
        first
            .checked_add_days(Days::new(v.round().max(0.0) as u64))
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };
    ctx.configure_mesh()
        .x_desc("Date")
        .y_desc(&chart.y_label)
        .x_labels(8)
        .x_label_formatter(&date_label)
        .draw()
        .map_err(draw_err)?;

    if chart.zero_line {
        ctx.draw_series(std::iter::once(PathElement::new(
            vec![(x0, 0.0), (x1, 0.0)],
            BLACK.mix(0.5),
        )))
        .map_err(draw_err)?;
    }

    for (i, s) in chart.series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        ctx.draw_series(LineSeries::new(
            s.points.iter().map(|&(d, v)| (x_of(d), v)),
            color.stroke_width(2),
        ))
        .map_err(draw_err)?
        .label(&s.label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if let Some((date, label)) = &chart.marker {
        let x = x_of(*date);
        ctx.draw_series(std::iter::once(PathElement::new(
            vec![(x, y0), (x, y1)],
            MARKER.stroke_width(2),
        )))
        .map_err(draw_err)?
        .label(label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MARKER.stroke_width(2)));
    }

    ctx.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_err)?;
    root.present().map_err(draw_err)?;
    debug!(path = %path.display(), "chart written");
    Ok(())
}

/// Render horizontal bars (first bar at the top) with a zero reference line.
pub fn render_bar_chart(path: &Path, title: &str, x_label: &str, bars: &[Bar]) -> Result<(), AppError> {
    if bars.is_empty() {
        return Err(AppError::new(EXIT_DATA, format!("Chart '{title}' has no data.")));
    }
    let n = bars.len();
    let lo = bars.iter().map(|b| b.value).fold(0.0_f64, f64::min);
    let hi = bars.iter().map(|b| b.value).fold(0.0_f64, f64::max);
    if !(lo.is_finite() && hi.is_finite()) {
        return Err(AppError::new(EXIT_DATA, format!("Chart '{title}' has non-finite values.")));
    }
    let (x0, x1) = padded(lo, hi);
    // Row i is drawn at y = n - 1 - i so the first bar is on top.
    let y_of = |i: usize| (n - 1 - i) as f64;

    let root = SVGBackend::new(path, BAR_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    let mut ctx = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(300)
        .build_cartesian_2d(x0..x1, -0.5..(n as f64 - 0.5))
        .map_err(draw_err)?;

    let row_label = |v: &f64| {
        let r = v.round();
        if (v - r).abs() > 1e-6 || r < 0.0 || r >= n as f64 {
            return String::new();
        }
        bars[n - 1 - r as usize].label.clone()
    };
    ctx.configure_mesh()
        .x_desc(x_label)
        .y_labels(n)
        .y_label_formatter(&row_label)
        .disable_y_mesh()
        .draw()
        .map_err(draw_err)?;

    ctx.draw_series(bars.iter().enumerate().map(|(i, b)| {
        let color = if b.highlight { PALETTE[0] } else { RGBColor(128, 128, 128) };
        let y = y_of(i);
        Rectangle::new([(0.0, y - 0.35), (b.value, y + 0.35)], color.mix(0.7).filled())
    }))
    .map_err(draw_err)?;
    ctx.draw_series(std::iter::once(PathElement::new(
        vec![(0.0, -0.5), (0.0, n as f64 - 0.5)],
        RED.mix(0.7).stroke_width(2),
    )))
    .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    debug!(path = %path.display(), "chart written");
    Ok(())
}
