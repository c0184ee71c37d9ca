//! Synthetic trajectory and treatment gap.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::{DonorWeights, EffectPoint, EffectSeries};
use crate::error::{AppError, EXIT_DATA};
use crate::synth::matrix::{DateSeries, PriceMatrix};

/// Apply `weights` to the full-period donor matrix and compare with the
/// target's actual prices.
///
/// Actual and synthetic are inner-joined on date; dates present on one side
/// only are counted in [`EffectSeries::dropped_dates`]. A point is `post`
/// when its date is on or after `cutover`.
pub fn estimate_effect(
    x_full: &PriceMatrix,
    weights: &DonorWeights,
    actual: &DateSeries,
    cutover: NaiveDate,
) -> Result<EffectSeries, AppError> {
    if x_full.zones != weights.zones {
        return Err(AppError::new(
            EXIT_DATA,
            format!(
                "Donor columns [{}] do not match fitted weights [{}].",
                x_full.zones.join(", "),
                weights.zones.join(", ")
            ),
        ));
    }

    let w = nalgebra::DVector::from_column_slice(&weights.values);
    let synthetic = &x_full.values * w;
    let synth_by_date: BTreeMap<NaiveDate, f64> = x_full
        .dates
        .iter()
        .copied()
        .zip(synthetic.iter().copied())
        .collect();

    let points: Vec<EffectPoint> = actual
        .dates
        .iter()
        .zip(actual.values.iter())
        .filter_map(|(&date, &price)| {
            synth_by_date.get(&date).map(|&synthetic| EffectPoint {
                date,
                actual: price,
                synthetic,
                gap: price - synthetic,
                post: date >= cutover,
            })
        })
        .collect();

    if points.is_empty() {
        return Err(AppError::new(EXIT_DATA, "Actual and synthetic series share no dates."));
    }
    let dropped_dates = x_full.nrows() + actual.len() - 2 * points.len();
    if dropped_dates > 0 {
        warn!(dropped_dates, "dates without both actual and synthetic prices");
    }

    Ok(EffectSeries {
        cutover,
        points,
        dropped_dates,
    })
}

#[cfg(test)]
mod tests {
    use nalgebra::DMatrix;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 5, d).unwrap()
    }

    #[test]
    fn gap_is_actual_minus_weighted_donors() {
        let x = PriceMatrix {
            dates: vec![day(1), day(2)],
            zones: vec!["A".into(), "B".into()],
            values: DMatrix::from_row_slice(2, 2, &[10.0, 20.0, 30.0, 40.0]),
        };
        let w = DonorWeights { zones: vec!["A".into(), "B".into()], values: vec![0.5, 0.25] };
        let actual = DateSeries { dates: vec![day(1), day(2)], values: vec![12.0, 20.0] };

        let s = estimate_effect(&x, &w, &actual, day(2)).unwrap();
        assert_eq!(s.points[0].synthetic, 10.0);
        assert_eq!(s.points[0].gap, 2.0);
        assert!(!s.points[0].post);
        assert_eq!(s.points[1].synthetic, 25.0);
        assert_eq!(s.points[1].gap, -5.0);
        assert!(s.points[1].post);
        assert_eq!(s.average_post_gap(), Some(-5.0));
        assert_eq!(s.dropped_dates, 0);
    }

    #[test]
    fn unmatched_dates_are_dropped_and_counted() {
        let x = PriceMatrix {
            dates: vec![day(1), day(2), day(3)],
            zones: vec!["A".into()],
            values: DMatrix::from_row_slice(3, 1, &[1.0, 2.0, 3.0]),
        };
        let w = DonorWeights { zones: vec!["A".into()], values: vec![1.0] };
        let actual = DateSeries { dates: vec![day(2), day(3), day(4)], values: vec![2.0, 3.0, 4.0] };

        let s = estimate_effect(&x, &w, &actual, day(1)).unwrap();
        assert_eq!(s.points.len(), 2);
        assert_eq!(s.dropped_dates, 2);
        assert!(s.points.iter().all(|p| p.gap == 0.0));
        assert_eq!(s.average_post_gap(), Some(0.0));
    }

    #[test]
    fn mismatched_donor_columns_fail() {
        let x = PriceMatrix {
            dates: vec![day(1)],
            zones: vec!["A".into(), "B".into()],
            values: DMatrix::from_row_slice(1, 2, &[1.0, 2.0]),
        };
        let w = DonorWeights { zones: vec!["B".into(), "A".into()], values: vec![1.0, 1.0] };
        let actual = DateSeries { dates: vec![day(1)], values: vec![3.0] };
        assert!(estimate_effect(&x, &w, &actual, day(1)).is_err());
    }
}
