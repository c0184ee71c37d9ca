//! Placebo-based inference.

use serde::Serialize;

use crate::domain::ItemOutcome;
use crate::synth::placebo::PlaceboRun;

/// Share of placebo gaps at least as extreme as the real one, with a +1
/// correction on both sides:
///
/// `p = (#{|g| ≥ |real|} + 1) / (n + 1)`
///
/// Always in `(0, 1]`; with no placebos it is exactly 1.
pub fn pseudo_p_value(real_gap: f64, placebo_gaps: &[f64]) -> f64 {
    let threshold = real_gap.abs();
    let extreme = placebo_gaps.iter().filter(|g| g.abs() >= threshold).count();
    (extreme as f64 + 1.0) / (placebo_gaps.len() as f64 + 1.0)
}

/// Treated effect together with how the placebo loop went.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    pub treated_effect: f64,
    pub p_value: f64,
    /// Placebos that contributed a gap.
    pub n_placebo: usize,
    pub n_skipped: usize,
    pub n_failed: usize,
}

pub fn summarize(treated_effect: f64, runs: &[PlaceboRun]) -> Inference {
    let gaps: Vec<f64> = runs
        .iter()
        .filter_map(|r| r.outcome.ok().map(|fit| fit.average_post_gap))
        .collect();
    let n_skipped = runs
        .iter()
        .filter(|r| matches!(r.outcome, ItemOutcome::Skipped(_)))
        .count();
    let n_failed = runs
        .iter()
        .filter(|r| matches!(r.outcome, ItemOutcome::Failed(_)))
        .count();

    Inference {
        treated_effect,
        p_value: pseudo_p_value(treated_effect, &gaps),
        n_placebo: gaps.len(),
        n_skipped,
        n_failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_placebos_gives_one() {
        assert_eq!(pseudo_p_value(3.0, &[]), 1.0);
    }

    #[test]
    fn counts_placebos_at_least_as_extreme() {
        // |−5| and |4| are ≥ 4; 1 is not.
        let p = pseudo_p_value(-4.0, &[1.0, -5.0, 4.0]);
        assert!((p - 0.75).abs() < 1e-12);
    }

    #[test]
    fn tie_with_the_largest_placebo_counts_as_extreme() {
        let placebos = [1.0, -3.0, 2.0];
        let p = pseudo_p_value(3.0, &placebos);
        assert!((p - 2.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn most_extreme_real_effect_gets_smallest_p() {
        let placebos = [0.5, -0.2, 1.0, 0.8];
        let p = pseudo_p_value(10.0, &placebos);
        assert!((p - 1.0 / 5.0).abs() < 1e-12);
        assert!(p > 0.0 && p <= 1.0);
    }

    #[test]
    fn p_value_shrinks_as_real_effect_grows() {
        let placebos = [0.5, -1.5, 2.5, -3.5];
        let mut last = f64::INFINITY;
        for real in [0.0, 1.0, 2.0, 3.0, 4.0] {
            let p = pseudo_p_value(real, &placebos);
            assert!(p <= last);
            last = p;
        }
    }
}
