//! Peak-hour aggregation and zone roles.
//!
//! Turns hourly rows into one mean peak-hour price per `(date, zone)` and
//! identifies the treated zone, the donor zones, and the policy start.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{Observation, PeakObservation};
use crate::error::{AppError, EXIT_DATA, EXIT_INPUT};

/// Evening peak, hour-ending 17 through 20.
pub const DEFAULT_PEAK_HOURS: RangeInclusive<u32> = 17..=20;

#[derive(Debug, Default)]
struct Group {
    treated: bool,
    post: bool,
    sum: f64,
    n: usize,
}

/// Mean price over `hours` (inclusive) per `(date, zone)`.
///
/// Output is ordered by `(date, zone)`. A `(date, zone)` with no hour inside
/// the range produces no row. `treated`/`post` must agree across the hours of
/// a group.
pub fn aggregate_peak(
    observations: &[Observation],
    hours: RangeInclusive<u32>,
) -> Result<Vec<PeakObservation>, AppError> {
    if hours.start() > hours.end() {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("Invalid peak hour range {}..={}.", hours.start(), hours.end()),
        ));
    }

    let mut groups: BTreeMap<(NaiveDate, &str), Group> = BTreeMap::new();
    for o in observations.iter().filter(|o| hours.contains(&o.hour)) {
        let g = groups.entry((o.date, o.zone.as_str())).or_insert_with(|| Group {
            treated: o.treated,
            post: o.post,
            ..Group::default()
        });
        if g.treated != o.treated || g.post != o.post {
            return Err(AppError::new(
                EXIT_DATA,
                format!(
                    "Inconsistent treated/post flags within date={} zone={}.",
                    o.date, o.zone
                ),
            ));
        }
        g.sum += o.price;
        g.n += 1;
    }

    let rows: Vec<PeakObservation> = groups
        .into_iter()
        .map(|((date, zone), g)| PeakObservation {
            date,
            zone: zone.to_string(),
            treated: g.treated,
            post: g.post,
            avg_price: g.sum / g.n as f64,
        })
        .collect();

    debug!(rows = rows.len(), "aggregated peak-hour prices");
    if rows.is_empty() {
        return Err(AppError::new(
            EXIT_DATA,
            format!("No observations inside peak hours {}..={}.", hours.start(), hours.end()),
        ));
    }
    Ok(rows)
}

/// The single zone flagged `treated = 1`.
pub fn treated_zone(rows: &[PeakObservation]) -> Result<String, AppError> {
    let treated: BTreeSet<&str> = rows
        .iter()
        .filter(|r| r.treated)
        .map(|r| r.zone.as_str())
        .collect();
    let mut iter = treated.iter();
    match (iter.next(), iter.next()) {
        (Some(zone), None) => Ok((*zone).to_string()),
        (None, _) => Err(AppError::new(EXIT_DATA, "No zone is flagged treated = 1.")),
        (Some(_), Some(_)) => Err(AppError::new(
            EXIT_DATA,
            format!(
                "Exactly one treated zone is required, found {}: {}.",
                treated.len(),
                treated.iter().copied().collect::<Vec<_>>().join(", ")
            ),
        )),
    }
}

/// Untreated zones, sorted by name.
pub fn control_zones(rows: &[PeakObservation]) -> Vec<String> {
    let zones: BTreeSet<&str> = rows
        .iter()
        .filter(|r| !r.treated)
        .map(|r| r.zone.as_str())
        .collect();
    zones.into_iter().map(str::to_string).collect()
}

/// Earliest date flagged `post = 1`.
pub fn infer_cutover(rows: &[PeakObservation]) -> Result<NaiveDate, AppError> {
    rows.iter()
        .filter(|r| r.post)
        .map(|r| r.date)
        .min()
        .ok_or_else(|| AppError::new(EXIT_DATA, "No rows flagged post = 1; pass an explicit cutover date."))
}
