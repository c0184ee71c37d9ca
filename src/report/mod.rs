//! Comparison of specification outcomes: best model, robustness checks.
//!
//! Formatting lives in `format`; this module only folds the runner's ordered
//! outcomes into plain values.

pub mod format;

use serde::Serialize;

use crate::panel::estimator::{SpecResult, SpecRun};
use crate::panel::specs::{
    LOG_TWO_WAY_FE_CONTROLS, POOLED_OLS, RESTRICTED_TWO_WAY_FE_CONTROLS, TWO_WAY_FE, TWO_WAY_FE_CONTROLS,
};

pub use format::*;

/// Coefficient gap ($/MWh) above which two specifications disagree.
pub const ROBUSTNESS_THRESHOLD: f64 = 5.0;

/// Fitted specifications, in menu order.
pub fn successful(runs: &[SpecRun]) -> Vec<&SpecResult> {
    runs.iter().filter_map(|r| r.outcome.ok()).collect()
}

/// Specification with the highest R² (earliest wins ties).
///
/// R² is not comparable across pooled, within and log specifications; this
/// is a reporting convenience, not a model-selection criterion.
pub fn best_by_r_squared(runs: &[SpecRun]) -> Option<&SpecResult> {
    successful(runs)
        .into_iter()
        .filter(|r| r.r_squared.is_finite())
        .fold(None, |best: Option<&SpecResult>, r| match best {
            Some(b) if b.r_squared >= r.r_squared => Some(b),
            _ => Some(r),
        })
}

fn fitted<'a>(runs: &'a [SpecRun], name: &str) -> Option<&'a SpecResult> {
    runs.iter()
        .find(|r| r.spec.name == name)
        .and_then(|r| r.outcome.ok())
}

/// Verdict of one robustness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    /// The two specifications agree.
    Consistent,
    /// The two specifications disagree.
    Divergent,
    /// At least one specification failed.
    NotAvailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobustnessCheck {
    pub label: &'static str,
    pub status: CheckStatus,
    pub message: &'static str,
}

impl RobustnessCheck {
    fn new(label: &'static str, status: CheckStatus, consistent: &'static str, divergent: &'static str) -> Self {
        let message = match status {
            CheckStatus::Consistent => consistent,
            CheckStatus::Divergent => divergent,
            CheckStatus::NotAvailable => "not available (a specification in this comparison failed)",
        };
        Self { label, status, message }
    }
}

fn compare(a: Option<&SpecResult>, b: Option<&SpecResult>, divergent: impl Fn(f64, f64) -> bool) -> CheckStatus {
    match (a, b) {
        (Some(a), Some(b)) if divergent(a.did_coef, b.did_coef) => CheckStatus::Divergent,
        (Some(_), Some(_)) => CheckStatus::Consistent,
        _ => CheckStatus::NotAvailable,
    }
}

/// Pooled vs FE, full vs restricted sample, and log vs linear.
pub fn robustness_checks(runs: &[SpecRun]) -> Vec<RobustnessCheck> {
    let far = |a: f64, b: f64| (a - b).abs() > ROBUSTNESS_THRESHOLD;
    let opposite = |a: f64, b: f64| (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0);
    let twfe_ctrl = fitted(runs, TWO_WAY_FE_CONTROLS);

    vec![
        RobustnessCheck::new(
            "Pooled vs Fixed Effects",
            compare(fitted(runs, POOLED_OLS), fitted(runs, TWO_WAY_FE), far),
            "Similar results between pooled and FE models suggest limited unobserved heterogeneity",
            "Large differences between pooled and FE models suggest important unobserved heterogeneity",
        ),
        RobustnessCheck::new(
            "All zones vs restricted comparison",
            compare(twfe_ctrl, fitted(runs, RESTRICTED_TWO_WAY_FE_CONTROLS), far),
            "Similar results regardless of control group composition suggest robust policy effects",
            "Different results with a single comparison zone suggest heterogeneous policy effects",
        ),
        RobustnessCheck::new(
            "Log vs Linear models",
            compare(twfe_ctrl, fitted(runs, LOG_TWO_WAY_FE_CONTROLS), opposite),
            "Log and linear models show consistent direction, suggesting robust results",
            "Log and linear models show different signs, suggesting sensitivity to extreme values",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemOutcome;
    use crate::panel::specs::menu;

    fn result(spec_idx: usize, did: f64, r2: f64) -> SpecResult {
        SpecResult {
            spec: menu()[spec_idx],
            coefficients: Vec::new(),
            did_coef: did,
            did_se: 1.0,
            did_p: 0.01,
            r_squared: r2,
            n_obs: 10,
            n_entities: 2,
            n_periods: 5,
            df_resid: 5,
        }
    }

    fn runs(dids: &[Option<f64>]) -> Vec<SpecRun> {
        dids.iter()
            .enumerate()
            .map(|(i, d)| SpecRun {
                spec: menu()[i],
                outcome: match d {
                    Some(v) => ItemOutcome::Ok(result(i, *v, 0.1 * i as f64)),
                    None => ItemOutcome::Failed("singular".to_string()),
                },
            })
            .collect()
    }

    #[test]
    fn best_model_is_max_r_squared_first_on_ties() {
        let mut rs = runs(&[Some(1.0); 12]);
        for (i, r) in rs.iter_mut().enumerate() {
            if let ItemOutcome::Ok(res) = &mut r.outcome {
                res.r_squared = if i == 3 || i == 7 { 0.9 } else { 0.2 };
            }
        }
        assert_eq!(best_by_r_squared(&rs).unwrap().spec.name, menu()[3].name);
    }

    #[test]
    fn best_model_skips_failures() {
        let mut dids = vec![Some(1.0); 12];
        dids[11] = None;
        let rs = runs(&dids);
        assert_eq!(best_by_r_squared(&rs).unwrap().spec.name, menu()[10].name);
        assert_eq!(successful(&rs).len(), 11);
    }

    #[test]
    fn checks_flag_divergence_and_sign_flips() {
        let mut dids = vec![Some(2.0); 12];
        dids[0] = Some(20.0); // pooled far from two-way FE
        dids[7] = Some(-0.1); // log flips sign
        let checks = robustness_checks(&runs(&dids));
        assert_eq!(checks[0].status, CheckStatus::Divergent);
        assert_eq!(checks[1].status, CheckStatus::Consistent);
        assert_eq!(checks[2].status, CheckStatus::Divergent);
    }

    #[test]
    fn threshold_is_strict() {
        let mut dids = vec![Some(0.0); 12];
        dids[0] = Some(5.0);
        let checks = robustness_checks(&runs(&dids));
        assert_eq!(checks[0].status, CheckStatus::Consistent);
    }

    #[test]
    fn failed_inputs_make_a_check_unavailable() {
        let mut dids = vec![Some(1.0); 12];
        dids[9] = None;
        let checks = robustness_checks(&runs(&dids));
        assert_eq!(checks[1].status, CheckStatus::NotAvailable);
        assert!(checks[1].message.starts_with("not available"));
        assert_eq!(checks[0].status, CheckStatus::Consistent);
    }
}
