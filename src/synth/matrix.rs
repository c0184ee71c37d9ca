//! Date-indexed price containers.
//!
//! Every row of a [`PriceMatrix`] and every entry of a [`DateSeries`] carries
//! its date explicitly. Anything that combines two of them joins on date; no
//! code path pairs rows by position alone.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::domain::PeakObservation;
use crate::error::{AppError, EXIT_DATA};

/// Wide `date × zone` matrix of peak prices.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    /// Sorted ascending, one per row.
    pub dates: Vec<NaiveDate>,
    /// One per column.
    pub zones: Vec<String>,
    pub values: DMatrix<f64>,
}

impl PriceMatrix {
    /// Pivot `rows` into a matrix with one column per entry of `zones`.
    ///
    /// Only dates on which every requested zone has a price are kept; the
    /// rest are dropped with a warning.
    pub fn pivot<'a>(
        rows: impl IntoIterator<Item = &'a PeakObservation>,
        zones: &[String],
    ) -> Result<Self, AppError> {
        if zones.is_empty() {
            return Err(AppError::new(EXIT_DATA, "Price matrix needs at least one zone."));
        }
        let col: HashMap<&str, usize> = zones
            .iter()
            .enumerate()
            .map(|(j, z)| (z.as_str(), j))
            .collect();

        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for r in rows {
            if let Some(&j) = col.get(r.zone.as_str()) {
                by_date.entry(r.date).or_insert_with(|| vec![None; zones.len()])[j] = Some(r.avg_price);
            }
        }

        let total = by_date.len();
        let complete: Vec<(NaiveDate, Vec<f64>)> = by_date
            .into_iter()
            .filter_map(|(d, cells)| cells.into_iter().collect::<Option<Vec<f64>>>().map(|v| (d, v)))
            .collect();
        if complete.len() < total {
            warn!(
                dropped = total - complete.len(),
                kept = complete.len(),
                "dropping dates with missing donor prices"
            );
        }
        if complete.is_empty() {
            return Err(AppError::new(
                EXIT_DATA,
                format!("No date has prices for all of: {}.", zones.join(", ")),
            ));
        }

        let n = complete.len();
        let values = DMatrix::from_fn(n, zones.len(), |i, j| complete[i].1[j]);
        Ok(Self {
            dates: complete.into_iter().map(|(d, _)| d).collect(),
            zones: zones.to_vec(),
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.dates.len()
    }

    /// Keep only rows whose date is in `keep`.
    pub fn select_dates(&self, keep: &BTreeSet<NaiveDate>) -> Self {
        let rows: Vec<usize> = (0..self.nrows())
            .filter(|&i| keep.contains(&self.dates[i]))
            .collect();
        Self {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            zones: self.zones.clone(),
            values: self.values.select_rows(rows.iter()),
        }
    }
}

/// One zone's peak prices, sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl DateSeries {
    /// All rows of `zone`, sorted by date.
    pub fn for_zone<'a>(
        rows: impl IntoIterator<Item = &'a PeakObservation>,
        zone: &str,
    ) -> Result<Self, AppError> {
        let by_date: BTreeMap<NaiveDate, f64> = rows
            .into_iter()
            .filter(|r| r.zone == zone)
            .map(|r| (r.date, r.avg_price))
            .collect();
        if by_date.is_empty() {
            return Err(AppError::new(EXIT_DATA, format!("No prices for zone {zone}.")));
        }
        Ok(Self {
            dates: by_date.keys().copied().collect(),
            values: by_date.values().copied().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.values)
    }

    pub fn select_dates(&self, keep: &BTreeSet<NaiveDate>) -> Self {
        let (dates, values) = self
            .dates
            .iter()
            .zip(self.values.iter())
            .filter(|(d, _)| keep.contains(d))
            .map(|(d, v)| (*d, *v))
            .unzip();
        Self { dates, values }
    }
}

/// Restrict `x` and `y` to the dates they share.
pub fn align(x: &PriceMatrix, y: &DateSeries) -> Result<(PriceMatrix, DateSeries), AppError> {
    let x_dates: BTreeSet<NaiveDate> = x.dates.iter().copied().collect();
    let common: BTreeSet<NaiveDate> = y.dates.iter().copied().filter(|d| x_dates.contains(d)).collect();
    if common.is_empty() {
        return Err(AppError::new(EXIT_DATA, "Donor matrix and target series share no dates."));
    }
    let dropped = x.nrows() + y.len() - 2 * common.len();
    if dropped > 0 {
        warn!(dropped, kept = common.len(), "aligning target and donors on shared dates");
    }
    Ok((x.select_dates(&common), y.select_dates(&common)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, zone: &str, price: f64) -> PeakObservation {
        PeakObservation {
            date: NaiveDate::from_ymd_opt(2022, 3, day).unwrap(),
            zone: zone.to_string(),
            treated: false,
            post: false,
            avg_price: price,
        }
    }

    fn zones(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn pivot_orders_rows_by_date_and_columns_by_request() {
        let rows = vec![row(2, "B", 4.0), row(1, "A", 1.0), row(2, "A", 3.0), row(1, "B", 2.0)];
        let m = PriceMatrix::pivot(&rows, &zones(&["B", "A"])).unwrap();
        assert_eq!(m.dates.len(), 2);
        assert!(m.dates[0] < m.dates[1]);
        assert_eq!(m.values[(0, 0)], 2.0);
        assert_eq!(m.values[(0, 1)], 1.0);
        assert_eq!(m.values[(1, 0)], 4.0);
    }

    #[test]
    fn pivot_drops_incomplete_dates() {
        let rows = vec![row(1, "A", 1.0), row(1, "B", 2.0), row(2, "A", 3.0)];
        let m = PriceMatrix::pivot(&rows, &zones(&["A", "B"])).unwrap();
        assert_eq!(m.nrows(), 1);
        assert_eq!(m.dates[0], NaiveDate::from_ymd_opt(2022, 3, 1).unwrap());
    }

    #[test]
    fn align_keeps_shared_dates_only() {
        let rows = vec![row(1, "A", 1.0), row(2, "A", 2.0), row(3, "A", 3.0), row(2, "T", 20.0), row(3, "T", 30.0), row(4, "T", 40.0)];
        let x = PriceMatrix::pivot(&rows, &zones(&["A"])).unwrap();
        let y = DateSeries::for_zone(&rows, "T").unwrap();
        let (x, y) = align(&x, &y).unwrap();
        assert_eq!(x.dates, y.dates);
        assert_eq!(y.values, vec![20.0, 30.0]);
        assert_eq!(x.values.as_slice(), &[2.0, 3.0]);
    }

    #[test]
    fn align_without_overlap_fails() {
        let rows = vec![row(1, "A", 1.0), row(2, "T", 2.0)];
        let x = PriceMatrix::pivot(&rows, &zones(&["A"])).unwrap();
        let y = DateSeries::for_zone(&rows, "T").unwrap();
        assert!(align(&x, &y).is_err());
    }
}
