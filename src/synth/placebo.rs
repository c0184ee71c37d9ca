//! Placebo loop: each control zone in turn plays the treated unit.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{ItemOutcome, PeakObservation};
use crate::synth::control::{SyntheticControl, fit_synthetic_control};

/// Fewest donors a placebo fit is attempted with.
pub const MIN_PLACEBO_DONORS: usize = 2;

/// Outcome of one placebo zone.
#[derive(Debug, Clone)]
pub struct PlaceboRun {
    pub zone: String,
    pub outcome: ItemOutcome<SyntheticControl>,
}

/// Fit a synthetic control for every zone in `controls`, using the other
/// controls as donors. The real treated zone never enters a donor pool.
///
/// A failure in one zone does not affect the others. Results follow the order
/// of `controls`.
pub fn run_placebos(
    rows: &[PeakObservation],
    controls: &[String],
    cutover: NaiveDate,
    alpha: f64,
) -> Vec<PlaceboRun> {
    let runs: Vec<PlaceboRun> = controls
        .par_iter()
        .map(|zone| {
            let donors: Vec<String> = controls.iter().filter(|z| *z != zone).cloned().collect();
            let outcome = if donors.len() < MIN_PLACEBO_DONORS {
                ItemOutcome::Skipped(format!(
                    "only {} donor zone(s), need at least {MIN_PLACEBO_DONORS}",
                    donors.len()
                ))
            } else {
                match fit_synthetic_control(rows, zone, &donors, cutover, alpha) {
                    Ok(fit) => ItemOutcome::Ok(fit),
                    Err(e) => ItemOutcome::Failed(e.message().to_string()),
                }
            };
            PlaceboRun {
                zone: zone.clone(),
                outcome,
            }
        })
        .collect();

    for run in &runs {
        if let Some(reason) = run.outcome.reason() {
            warn!(zone = %run.zone, status = run.outcome.status(), reason, "placebo not used");
        }
    }
    info!(
        zones = runs.len(),
        ok = runs.iter().filter(|r| r.outcome.is_ok()).count(),
        "placebo loop finished"
    );
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::inference::summarize;

    fn rows(zone: &str, prices: &[f64]) -> Vec<PeakObservation> {
        let start = NaiveDate::from_ymd_opt(2022, 4, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PeakObservation {
                date: start + chrono::Days::new(i as u64),
                zone: zone.to_string(),
                treated: zone == "T",
                post: i >= 4,
                avg_price: p,
            })
            .collect()
    }

    fn cutover() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 4, 5).unwrap()
    }

    #[test]
    fn two_controls_leave_too_few_donors() {
        let mut data = rows("A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        data.extend(rows("B", &[2.0, 1.0, 2.0, 1.0, 2.0, 1.0]));
        let controls = vec!["A".to_string(), "B".to_string()];

        let runs = run_placebos(&data, &controls, cutover(), 1.0);
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| matches!(r.outcome, ItemOutcome::Skipped(_))));

        let inf = summarize(3.0, &runs);
        assert_eq!(inf.n_placebo, 0);
        assert_eq!(inf.n_skipped, 2);
        assert_eq!(inf.p_value, 1.0);
    }

    #[test]
    fn failures_are_recorded_per_zone() {
        let mut data = rows("A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        data.extend(rows("B", &[2.0, 1.0, 2.0, 1.0, 2.0, 1.0]));
        data.extend(rows("C", &[3.0, 3.5, 2.5, 4.0, 3.0, 2.0]));
        // D has no pre-period prices: no fit can use it, as target or donor.
        data.extend(rows("D", &[9.0, 9.0, 9.0, 9.0, 9.0, 9.0]).into_iter().filter(|r| r.post));
        let controls: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();

        let runs = run_placebos(&data, &controls, cutover(), 1.0);
        let zones: Vec<&str> = runs.iter().map(|r| r.zone.as_str()).collect();
        assert_eq!(zones, vec!["A", "B", "C", "D"]);
        assert!(runs.iter().all(|r| matches!(r.outcome, ItemOutcome::Failed(_))));

        let inf = summarize(0.0, &runs);
        assert_eq!(inf.n_failed, 4);
        assert_eq!(inf.p_value, 1.0);
    }

    #[test]
    fn real_treated_zone_is_never_a_donor() {
        let mut data = rows("A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        data.extend(rows("B", &[2.0, 1.0, 2.0, 1.0, 2.0, 1.0]));
        data.extend(rows("C", &[3.0, 3.5, 2.5, 4.0, 3.0, 2.0]));
        data.extend(rows("T", &[5.0, 5.0, 5.0, 5.0, 50.0, 50.0]));
        let controls: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();

        let runs = run_placebos(&data, &controls, cutover(), 1.0);
        for run in &runs {
            let fit = run.outcome.ok().unwrap();
            assert!(fit.weights.get("T").is_none());
            assert!(fit.weights.get(&run.zone).is_none());
            assert_eq!(fit.weights.len(), 2);
        }
    }
}
