//! Fixed-effects absorption by within-demeaning.
//!
//! For one FE dimension a single pass (subtract group means) is exact. For
//! two or more dimensions (entity + time) we use the method of alternating
//! projections: sweep each dimension in turn until every group mean of the
//! residual vector is below tolerance. On a balanced panel this converges in
//! one sweep; unbalanced panels need a few more.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{AppError, EXIT_NUMERIC};

/// Convergence tolerance for alternating projections, relative to the scale
/// of the input vector.
const DEFAULT_TOL: f64 = 1e-12;

/// Safety bound on projection sweeps.
const DEFAULT_MAX_ITER: usize = 10_000;

/// Map arbitrary group labels to dense `0..n_levels` indices (first
/// occurrence order).
pub fn dense_ids<K: Eq + Hash + Clone>(labels: &[K]) -> Vec<usize> {
    let mut index: HashMap<K, usize> = HashMap::new();
    labels
        .iter()
        .map(|k| {
            let next = index.len();
            *index.entry(k.clone()).or_insert(next)
        })
        .collect()
}

/// Absorbs one or more categorical fixed effects from data vectors.
#[derive(Debug, Clone)]
pub struct FixedEffects {
    n: usize,
    /// For each dimension, for each level: observation indices.
    members: Vec<Vec<Vec<usize>>>,
    tol: f64,
    max_iter: usize,
}

impl FixedEffects {
    /// `dimensions`: one dense group index vector (length n) per FE dimension.
    pub fn new(dimensions: Vec<Vec<usize>>) -> Result<Self, AppError> {
        let Some(first) = dimensions.first() else {
            return Err(AppError::new(EXIT_NUMERIC, "At least one fixed-effect dimension is required."));
        };
        let n = first.len();
        if n == 0 {
            return Err(AppError::new(EXIT_NUMERIC, "No observations to demean."));
        }

        let mut members = Vec::with_capacity(dimensions.len());
        for (d, groups) in dimensions.iter().enumerate() {
            if groups.len() != n {
                return Err(AppError::new(
                    EXIT_NUMERIC,
                    format!("Fixed-effect dimension {d} has length {}, expected {n}.", groups.len()),
                ));
            }
            let n_levels = groups.iter().copied().max().map_or(0, |m| m + 1);
            let mut idx: Vec<Vec<usize>> = vec![Vec::new(); n_levels];
            for (i, &g) in groups.iter().enumerate() {
                idx[g].push(i);
            }
            idx.retain(|m| !m.is_empty());
            members.push(idx);
        }

        Ok(Self {
            n,
            members,
            tol: DEFAULT_TOL,
            max_iter: DEFAULT_MAX_ITER,
        })
    }

    /// Return `v` with all fixed effects partialled out.
    pub fn absorb(&self, v: &[f64]) -> Result<Vec<f64>, AppError> {
        if v.len() != self.n {
            return Err(AppError::new(
                EXIT_NUMERIC,
                format!("Vector length ({}) != observations ({}).", v.len(), self.n),
            ));
        }

        let mut resid = v.to_vec();
        if self.members.len() == 1 {
            demean_dim(&mut resid, &self.members[0]);
            return Ok(resid);
        }

        let scale = v.iter().fold(1.0_f64, |m, x| m.max(x.abs()));
        let threshold = self.tol * scale;
        for _ in 0..self.max_iter {
            for dim in &self.members {
                demean_dim(&mut resid, dim);
            }
            let worst = self
                .members
                .iter()
                .map(|dim| max_group_mean_abs(&resid, dim))
                .fold(0.0_f64, f64::max);
            if worst < threshold {
                return Ok(resid);
            }
        }

        Err(AppError::new(
            EXIT_NUMERIC,
            format!("Fixed-effect absorption did not converge in {} sweeps.", self.max_iter),
        ))
    }
}

fn demean_dim(v: &mut [f64], groups: &[Vec<usize>]) {
    for members in groups {
        let mean = members.iter().map(|&i| v[i]).sum::<f64>() / members.len() as f64;
        for &i in members {
            v[i] -= mean;
        }
    }
}

fn max_group_mean_abs(v: &[f64], groups: &[Vec<usize>]) -> f64 {
    groups
        .iter()
        .map(|members| (members.iter().map(|&i| v[i]).sum::<f64>() / members.len() as f64).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_ids_follow_first_occurrence() {
        assert_eq!(dense_ids(&["b", "a", "b", "c"]), vec![0, 1, 0, 2]);
    }

    #[test]
    fn entity_demeaning_removes_group_means() {
        let fe = FixedEffects::new(vec![vec![0, 0, 1, 1]]).unwrap();
        let out = fe.absorb(&[1.0, 3.0, 10.0, 14.0]).unwrap();
        assert_eq!(out, vec![-1.0, 1.0, -2.0, 2.0]);
    }

    #[test]
    fn two_way_demeaning_on_balanced_panel_matches_closed_form() {
        // 2 entities × 3 periods: y_it - ȳ_i - ȳ_t + ȳ
        let entity = vec![0, 0, 0, 1, 1, 1];
        let time = vec![0, 1, 2, 0, 1, 2];
        let y = [1.0, 4.0, 2.0, 6.0, 5.0, 9.0];
        let fe = FixedEffects::new(vec![entity.clone(), time.clone()]).unwrap();
        let out = fe.absorb(&y).unwrap();

        let grand = y.iter().sum::<f64>() / 6.0;
        let ent_mean = [7.0 / 3.0, 20.0 / 3.0];
        let time_mean = [3.5, 4.5, 5.5];
        for i in 0..6 {
            let expected = y[i] - ent_mean[entity[i]] - time_mean[time[i]] + grand;
            assert!((out[i] - expected).abs() < 1e-10, "i={i}: {} vs {expected}", out[i]);
        }
    }

    #[test]
    fn two_way_demeaning_converges_on_unbalanced_panel() {
        let entity = vec![0, 0, 0, 1, 1, 2, 2, 2];
        let time = vec![0, 1, 2, 0, 2, 0, 1, 2];
        let y = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let fe = FixedEffects::new(vec![entity.clone(), time.clone()]).unwrap();
        let out = fe.absorb(&y).unwrap();

        for groups in [&entity, &time] {
            let mut sums = HashMap::new();
            for (i, &g) in groups.iter().enumerate() {
                *sums.entry(g).or_insert(0.0) += out[i];
            }
            assert!(sums.values().all(|s: &f64| s.abs() < 1e-9));
        }
    }
}
