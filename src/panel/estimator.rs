//! Specification fitting: fixed-effect absorption, OLS, HC0 inference.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::Serialize;
use statrs::function::erf::erfc;
use tracing::{info, warn};

use crate::domain::ItemOutcome;
use crate::error::{AppError, EXIT_NUMERIC};
use crate::math::{FixedEffects, RANK_TOL, dense_ids, fit_ols_robust};
use crate::panel::builder::Panel;
use crate::panel::specs::{Effects, ModelSpec, Regressor, SampleKind, menu};

/// Significance level used for the `significant` flag.
pub const SIGNIFICANCE: f64 = 0.05;

/// One estimated coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub name: &'static str,
    pub estimate: f64,
    /// HC0 robust standard error.
    pub std_error: f64,
    pub z: f64,
    /// Two-sided, standard normal.
    pub p_value: f64,
}

/// Fitted specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecResult {
    pub spec: ModelSpec,
    pub coefficients: Vec<Coefficient>,
    pub did_coef: f64,
    pub did_se: f64,
    pub did_p: f64,
    /// Centered R² for pooled specs, within R² for fixed-effects specs.
    pub r_squared: f64,
    pub n_obs: usize,
    pub n_entities: usize,
    pub n_periods: usize,
    /// Observations minus estimated and absorbed parameters.
    pub df_resid: usize,
}

impl SpecResult {
    pub fn significant(&self) -> bool {
        self.did_p < SIGNIFICANCE
    }
}

/// Outcome of one specification.
#[derive(Debug, Clone)]
pub struct SpecRun {
    pub spec: ModelSpec,
    pub outcome: ItemOutcome<SpecResult>,
}

/// Two-sided p-value of a standard-normal statistic.
pub fn normal_p_value(z: f64) -> f64 {
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Fit one specification on `panel`.
pub fn fit_spec(panel: &Panel, spec: &ModelSpec) -> Result<SpecResult, AppError> {
    let obs = &panel.observations;
    let n = obs.len();
    let columns = spec.design_columns();
    let n_entities = panel.n_entities();
    let n_periods = panel.n_periods();

    let mut y: Vec<f64> = obs.iter().map(|o| spec.response(o)).collect();
    let mut x: Vec<Vec<f64>> = columns
        .iter()
        .map(|c| obs.iter().map(|o| c.value(o)).collect())
        .collect();

    let absorbed = match spec.effects {
        Effects::None => 0,
        Effects::Entity => n_entities,
        Effects::TwoWay => n_entities + n_periods - 1,
    };
    if spec.effects != Effects::None {
        let entity = dense_ids(&obs.iter().map(|o| o.entity_id).collect::<Vec<_>>());
        let mut dims = vec![entity];
        if spec.effects == Effects::TwoWay {
            dims.push(dense_ids(&obs.iter().map(|o| o.time_id).collect::<Vec<_>>()));
        }
        let fe = FixedEffects::new(dims)?;
        y = fe.absorb(&y)?;
        for (col, reg) in x.iter_mut().zip(columns.iter()) {
            let before = norm(col);
            *col = fe.absorb(col)?;
            if norm(col) <= RANK_TOL * before.max(1.0) {
                return Err(AppError::new(
                    EXIT_NUMERIC,
                    format!("Regressor {reg} has no variation left after absorbing fixed effects."),
                ));
            }
        }
    }

    let p = columns.len();
    let df_resid = n
        .checked_sub(p + absorbed)
        .filter(|&df| df > 0)
        .ok_or_else(|| {
            AppError::new(
                EXIT_NUMERIC,
                format!("No residual degrees of freedom (n={n}, parameters={}).", p + absorbed),
            )
        })?;

    let design = DMatrix::from_fn(n, p, |i, j| x[j][i]);
    let response = DVector::from_vec(y);
    let fit = fit_ols_robust(&design, &response)?;

    let mean = response.mean();
    let tss: f64 = response.iter().map(|v| (v - mean) * (v - mean)).sum();
    if !(tss > 0.0) {
        return Err(AppError::new(EXIT_NUMERIC, "Response has no variation."));
    }
    let r_squared = 1.0 - fit.rss / tss;

    let coefficients: Vec<Coefficient> = columns
        .iter()
        .enumerate()
        .map(|(j, reg)| {
            let estimate = fit.beta[j];
            let std_error = fit.std_errors[j];
            let z = estimate / std_error;
            Coefficient {
                name: reg.name(),
                estimate,
                std_error,
                z,
                p_value: normal_p_value(z),
            }
        })
        .collect();

    let did = columns
        .iter()
        .position(|c| *c == Regressor::Did)
        .map(|j| &coefficients[j])
        .ok_or_else(|| AppError::new(EXIT_NUMERIC, "Design has no did column."))?;

    Ok(SpecResult {
        spec: *spec,
        did_coef: did.estimate,
        did_se: did.std_error,
        did_p: did.p_value,
        coefficients,
        r_squared,
        n_obs: n,
        n_entities,
        n_periods,
        df_resid,
    })
}

/// Run every specification of the menu. Outcomes follow menu order; a
/// failing specification does not affect the others.
pub fn run_all(full: &Panel, restricted: &Panel) -> Vec<SpecRun> {
    let runs: Vec<SpecRun> = menu()
        .par_iter()
        .map(|spec| {
            let panel = match spec.sample {
                SampleKind::Full => full,
                SampleKind::Restricted => restricted,
            };
            let outcome = match fit_spec(panel, spec) {
                Ok(r) => ItemOutcome::Ok(r),
                Err(e) => ItemOutcome::Failed(e.message().to_string()),
            };
            SpecRun { spec: *spec, outcome }
        })
        .collect();

    for run in &runs {
        if let Some(reason) = run.outcome.reason() {
            warn!(spec = run.spec.name, reason, "specification failed");
        }
    }
    info!(
        specs = runs.len(),
        ok = runs.iter().filter(|r| r.outcome.is_ok()).count(),
        "specifications estimated"
    );
    runs
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PanelRow, YearMonth};
    use crate::panel::builder::build_panel;
    use crate::panel::specs::{POOLED_OLS, TWO_WAY_FE};

    /// Deterministic panel: price = zone level + month level + effect·did + wiggle.
    fn panel(effect: f64) -> Panel {
        let zones = [("A", 30.0, false), ("B", 35.0, false), ("C", 28.0, false), ("T", 40.0, true)];
        let mut rows = Vec::new();
        for (zi, (zone, level, treated)) in zones.iter().enumerate() {
            for m in 0..12u32 {
                let post = m >= 6;
                let wiggle = (((zi as u32 * 7 + m * 3) % 5) as f64 - 2.0) * 0.3;
                let price = level + m as f64 * 0.5 + if *treated && post { effect } else { 0.0 } + wiggle;
                rows.push(PanelRow {
                    zone: zone.to_string(),
                    month: YearMonth::new(2021, m + 1).unwrap(),
                    treated: *treated,
                    post,
                    price,
                    load: 1000.0 + ((zi as u32 * 11 + m * 5) % 7) as f64 * 10.0,
                    gas_price: 4.0 + ((m * 2 + zi as u32) % 5) as f64 * 0.5,
                    weather: 50.0 + ((zi as u32 + m * 13) % 9) as f64,
                });
            }
        }
        build_panel(&rows).unwrap()
    }

    fn spec(name: &str) -> ModelSpec {
        *menu().iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn normal_p_values() {
        assert!((normal_p_value(0.0) - 1.0).abs() < 1e-12);
        assert!((normal_p_value(1.959963984540054) - 0.05).abs() < 1e-9);
        assert_eq!(normal_p_value(-2.5), normal_p_value(2.5));
    }

    #[test]
    fn two_way_fe_recovers_a_large_effect() {
        let p = panel(10.0);
        let r = fit_spec(&p, &spec(TWO_WAY_FE)).unwrap();
        assert!((r.did_coef - 10.0).abs() < 1.0, "did = {}", r.did_coef);
        assert!(r.significant());
        assert_eq!(r.coefficients.len(), 1);
        assert_eq!(r.n_obs, 48);
        assert_eq!(r.n_entities, 4);
        assert_eq!(r.n_periods, 12);
        assert_eq!(r.df_resid, 48 - 1 - (4 + 12 - 1));
    }

    #[test]
    fn pooled_did_equals_difference_of_differences() {
        let p = panel(6.0);
        let r = fit_spec(&p, &spec(POOLED_OLS)).unwrap();

        let mean = |treated: bool, post: bool| {
            let v: Vec<f64> = p
                .observations
                .iter()
                .filter(|o| o.treated == treated && o.post == post)
                .map(|o| o.price)
                .collect();
            v.iter().sum::<f64>() / v.len() as f64
        };
        let dd = (mean(true, true) - mean(true, false)) - (mean(false, true) - mean(false, false));
        assert!((r.did_coef - dd).abs() < 1e-9);
        assert_eq!(r.coefficients[0].name, "const");
        assert!(r.r_squared > 0.0 && r.r_squared <= 1.0);
    }

    #[test]
    fn all_specs_run_in_menu_order() {
        let full = panel(8.0);
        let restricted = full.restrict(&["A".to_string(), "T".to_string()]).unwrap();
        let runs = run_all(&full, &restricted);
        assert_eq!(runs.len(), 12);
        for (run, spec) in runs.iter().zip(menu()) {
            assert_eq!(run.spec.name, spec.name);
            assert!(run.outcome.is_ok(), "{}: {:?}", spec.name, run.outcome.reason());
        }
        let r = runs[8].outcome.ok().unwrap();
        assert_eq!(r.n_entities, 2);
    }

    #[test]
    fn regressor_absorbed_by_fixed_effects_fails_the_spec() {
        // Gas price identical across zones each month: absorbed by time effects.
        let mut p = panel(5.0);
        for o in &mut p.observations {
            o.gas_price = 3.0 + o.time_id as f64;
        }
        let err = fit_spec(&p, &spec(crate::panel::specs::TWO_WAY_FE_CONTROLS)).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_NUMERIC);
        assert!(err.message().contains("natural_gas_price"));
    }

    #[test]
    fn failing_specs_do_not_stop_the_others() {
        let mut full = panel(5.0);
        for o in &mut full.observations {
            o.gas_price = 3.0 + 0.25 * o.time_id as f64;
        }
        let restricted = full.restrict(&["A".to_string(), "T".to_string()]).unwrap();
        let runs = run_all(&full, &restricted);

        assert_eq!(runs.len(), 12);
        for (run, spec) in runs.iter().zip(menu()) {
            assert_eq!(run.spec.name, spec.name);
            let absorbed = spec.effects == Effects::TwoWay && spec.controls;
            assert_eq!(run.outcome.is_ok(), !absorbed, "{}: {:?}", spec.name, run.outcome.reason());
            if absorbed {
                assert!(run.outcome.reason().unwrap().contains("natural_gas_price"));
            }
        }
    }
}

