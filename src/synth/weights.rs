//! Donor weights by ridge regression.

use nalgebra::DVector;
use tracing::debug;

use crate::domain::DonorWeights;
use crate::error::{AppError, EXIT_DATA, EXIT_INPUT, EXIT_NUMERIC};
use crate::math::ridge_solve;
use crate::synth::matrix::{DateSeries, PriceMatrix};

/// Ridge penalty used when none is given.
pub const DEFAULT_ALPHA: f64 = 1.0;

/// Regress the target's pre-period prices on the donors' (no intercept).
///
/// `x_pre` and `y_pre` must carry the same dates in the same order; use
/// [`crate::synth::matrix::align`] first. Weights are unconstrained: they may
/// be negative and need not sum to one.
pub fn fit_donor_weights(
    x_pre: &PriceMatrix,
    y_pre: &DateSeries,
    alpha: f64,
) -> Result<DonorWeights, AppError> {
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("Ridge penalty must be finite and non-negative (got {alpha})."),
        ));
    }
    if x_pre.dates != y_pre.dates {
        return Err(AppError::new(
            EXIT_DATA,
            format!(
                "Donor matrix ({} dates) and target series ({} dates) are not aligned.",
                x_pre.nrows(),
                y_pre.len()
            ),
        ));
    }
    if y_pre.is_empty() {
        return Err(AppError::new(EXIT_DATA, "No pre-period dates to fit donor weights on."));
    }
    if x_pre.values.iter().chain(y_pre.values.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::new(EXIT_DATA, "Non-finite price in the pre-period."));
    }

    let y: DVector<f64> = y_pre.to_vector();
    let w = ridge_solve(&x_pre.values, &y, alpha)
        .ok_or_else(|| AppError::new(EXIT_NUMERIC, "Ridge system could not be solved."))?;

    debug!(donors = x_pre.zones.len(), dates = y_pre.len(), alpha, "fitted donor weights");
    Ok(DonorWeights {
        zones: x_pre.zones.clone(),
        values: w.iter().copied().collect(),
    })
}
