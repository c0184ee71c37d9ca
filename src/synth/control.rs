//! One synthetic-control fit: target zone vs a donor pool.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::{DonorWeights, EffectSeries, PeakObservation};
use crate::error::{AppError, EXIT_DATA};
use crate::synth::effect::estimate_effect;
use crate::synth::matrix::{DateSeries, PriceMatrix, align};
use crate::synth::weights::fit_donor_weights;

/// Weights and trajectory for one target zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticControl {
    pub zone: String,
    pub weights: DonorWeights,
    pub series: EffectSeries,
    /// Mean post-cutover gap.
    pub average_post_gap: f64,
}

/// Fit donor weights for `target` on rows flagged `post = 0`, then build the
/// full-period synthetic series from `donors`.
pub fn fit_synthetic_control(
    rows: &[PeakObservation],
    target: &str,
    donors: &[String],
    cutover: NaiveDate,
    alpha: f64,
) -> Result<SyntheticControl, AppError> {
    if donors.iter().any(|d| d == target) {
        return Err(AppError::new(
            EXIT_DATA,
            format!("Target zone {target} is also listed as a donor."),
        ));
    }

    let pre = rows.iter().filter(|r| !r.post);
    let x_pre = PriceMatrix::pivot(pre.clone(), donors)?;
    let y_pre = DateSeries::for_zone(pre, target)?;
    let (x_pre, y_pre) = align(&x_pre, &y_pre)?;
    let weights = fit_donor_weights(&x_pre, &y_pre, alpha)?;

    let x_full = PriceMatrix::pivot(rows, donors)?;
    let actual = DateSeries::for_zone(rows, target)?;
    let series = estimate_effect(&x_full, &weights, &actual, cutover)?;

    let average_post_gap = series.average_post_gap().ok_or_else(|| {
        AppError::new(
            EXIT_DATA,
            format!("No post-cutover dates for zone {target} (cutover {cutover})."),
        )
    })?;
    debug!(zone = target, average_post_gap, "synthetic control fitted");

    Ok(SyntheticControl {
        zone: target.to_string(),
        weights,
        series,
        average_post_gap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_for(zone: &str, prices: &[f64], cutover_idx: usize) -> Vec<PeakObservation> {
        let start = NaiveDate::from_ymd_opt(2022, 4, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PeakObservation {
                date: start + chrono::Days::new(i as u64),
                zone: zone.to_string(),
                treated: zone == "T",
                post: i >= cutover_idx,
                avg_price: p,
            })
            .collect()
    }

    #[test]
    fn target_that_tracks_a_donor_has_zero_gap() {
        let a = [10.0, 12.0, 11.0, 15.0, 14.0, 13.0];
        let b = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let t: Vec<f64> = a.iter().map(|v| 2.0 * v).collect();
        let mut rows = rows_for("A", &a, 4);
        rows.extend(rows_for("B", &b, 4));
        rows.extend(rows_for("T", &t, 4));

        let cutover = NaiveDate::from_ymd_opt(2022, 4, 5).unwrap();
        let fit = fit_synthetic_control(&rows, "T", &["A".into(), "B".into()], cutover, 0.0).unwrap();
        assert!((fit.weights.get("A").unwrap() - 2.0).abs() < 1e-8);
        assert!(fit.weights.get("B").unwrap().abs() < 1e-8);
        assert!(fit.average_post_gap.abs() < 1e-8);
    }

    #[test]
    fn missing_post_period_is_an_error() {
        let mut rows = rows_for("A", &[1.0, 2.0, 3.0], 10);
        rows.extend(rows_for("T", &[1.0, 2.0, 3.0], 10));
        let cutover = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(fit_synthetic_control(&rows, "T", &["A".into()], cutover, 1.0).is_err());
    }

    #[test]
    fn target_cannot_be_its_own_donor() {
        let rows = rows_for("A", &[1.0, 2.0], 1);
        let cutover = NaiveDate::from_ymd_opt(2022, 4, 2).unwrap();
        assert!(fit_synthetic_control(&rows, "A", &["A".into()], cutover, 1.0).is_err());
    }
}
