//! Least-squares solvers.
//!
//! Both pipelines reduce to small dense linear problems:
//!
//! ```text
//! ridge:  minimize ‖y − Xw‖² + λ‖w‖²            (donor weights, no intercept)
//! OLS:    minimize ‖y − Xβ‖², with HC0 covariance (panel specifications)
//! ```
//!
//! Implementation choices:
//! - Ridge uses the normal equations `(XᵀX + λI) w = Xᵀy` with a Cholesky
//!   factorization; for λ > 0 the system is positive definite. With λ = 0 and
//!   collinear donors it is only semi-definite, so we fall back to SVD.
//! - OLS checks the design's numerical rank from its singular values before
//!   inverting `XᵀX`, so a rank-deficient design is reported instead of being
//!   silently rank-reduced.
//! - Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices, so tall systems go through SVD.

use nalgebra::{DMatrix, DVector};

use crate::error::{AppError, EXIT_NUMERIC};

/// Relative singular-value threshold below which a design is rank deficient.
pub const RANK_TOL: f64 = 1e-10;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ridge regression without intercept.
///
/// Returns `None` if the penalized system cannot be solved.
pub fn ridge_solve(x: &DMatrix<f64>, y: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let p = x.ncols();
    let xt = x.transpose();
    let a = &xt * x + DMatrix::<f64>::identity(p, p) * lambda;
    let b = &xt * y;

    if let Some(chol) = a.clone().cholesky() {
        let w = chol.solve(&b);
        if w.iter().all(|v| v.is_finite()) {
            return Some(w);
        }
    }

    solve_least_squares(&a, &b)
}

/// OLS fit with heteroskedasticity-robust (White HC0) standard errors.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub beta: DVector<f64>,
    /// HC0 standard errors, one per column of the design.
    pub std_errors: Vec<f64>,
    pub residuals: DVector<f64>,
    /// Residual sum of squares.
    pub rss: f64,
}

/// Fit `y = Xβ + e` by OLS and compute HC0 standard errors:
///
/// `V = (XᵀX)⁻¹ (Σᵢ eᵢ² xᵢxᵢᵀ) (XᵀX)⁻¹`
pub fn fit_ols_robust(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, AppError> {
    let n = x.nrows();
    let p = x.ncols();
    if n == 0 || p == 0 {
        return Err(AppError::new(EXIT_NUMERIC, "Empty design matrix."));
    }
    if y.len() != n {
        return Err(AppError::new(
            EXIT_NUMERIC,
            format!("Response length ({}) != design rows ({n}).", y.len()),
        ));
    }
    if n < p {
        return Err(AppError::new(
            EXIT_NUMERIC,
            format!("Underdetermined design: n={n} < p={p}."),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::new(EXIT_NUMERIC, "Non-finite value in regression inputs."));
    }

    let sv = x.singular_values();
    let sv_max = sv.max();
    let sv_min = sv.min();
    if !(sv_max > 0.0) || sv_min <= sv_max * RANK_TOL {
        return Err(AppError::new(
            EXIT_NUMERIC,
            format!("Singular design matrix (condition {:.3e}).", sv_max / sv_min.max(f64::MIN_POSITIVE)),
        ));
    }

    let xt = x.transpose();
    let xtx_inv = (&xt * x)
        .try_inverse()
        .ok_or_else(|| AppError::new(EXIT_NUMERIC, "X'X is singular."))?;
    let beta = &xtx_inv * (&xt * y);
    let residuals = y - x * &beta;
    let rss: f64 = residuals.iter().map(|e| e * e).sum();

    // Meat of the sandwich: Σ e_i² x_i x_iᵀ
    let mut meat = DMatrix::<f64>::zeros(p, p);
    for i in 0..n {
        let e2 = residuals[i] * residuals[i];
        for a in 0..p {
            let xa = x[(i, a)] * e2;
            for b in 0..p {
                meat[(a, b)] += xa * x[(i, b)];
            }
        }
    }
    let cov = &xtx_inv * meat * &xtx_inv;
    let std_errors = (0..p).map(|j| cov[(j, j)].max(0.0).sqrt()).collect();

    Ok(OlsFit {
        beta,
        std_errors,
        residuals,
        rss,
    })
}
