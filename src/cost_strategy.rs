//! Design-quality criteria used by the exchange optimizer.
//!
//! Every criterion scores either the whole design or one column of it, and
//! decides for itself whether larger or smaller scores are better. Scores from
//! different criteria are never comparable.

use std::cmp::Ordering;

use anyhow::*;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::active_subsets::ActiveSubsets;
use crate::bayesian_measure::BayesianMeasure;
use crate::design_matrix::DesignMatrix;
use crate::li_measure::LiMeasure;
use crate::marley_measure::MarleyMeasure;

/// Gram eigenvalues at or below `EIGEN_TOL * N` mark a projection as singular.
pub const EIGEN_TOL: f64 = 1.0e-9;

pub const DEFAULT_WEIGHT: f64 = 0.5;
pub const DEFAULT_TAU: f64 = 1.0;

pub trait CostStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Score the whole design (`column == None`) or the contribution of one
    /// column. A singular projection gives `NaN`.
    fn measure(&self, design: &DesignMatrix, column: Option<usize>) -> f64;

    /// Plain comparison in this criterion's direction. `NaN` on either side is
    /// never better.
    fn is_better(&self, new: f64, old: f64) -> bool;

    /// Column indices, most deletion-worthy first.
    fn rank_for_deletion(&self, scores: &[f64]) -> Vec<usize>;

    /// Acceptance rule used by the optimizer: a `NaN` candidate never wins, a
    /// finite candidate always replaces a `NaN` incumbent.
    fn improves(&self, new: f64, old: f64) -> bool {
        if new.is_nan() {
            false
        } else if old.is_nan() {
            true
        } else {
            self.is_better(new, old)
        }
    }
}

/// Which criterion to optimise, with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Li,
    /// `weight` trades the A-optimality term against the average VIF term.
    Marley { weight: f64 },
    /// `active[j]` flags factor `j` as physically active (no prior precision).
    Bayesian { tau: f64, active: Vec<bool> },
}

impl Default for Criterion {
    fn default() -> Self {
        Criterion::Li
    }
}

impl Criterion {
    pub fn marley() -> Self {
        Criterion::Marley { weight: DEFAULT_WEIGHT }
    }

    pub fn bayesian() -> Self {
        Criterion::Bayesian { tau: DEFAULT_TAU, active: vec![] }
    }

    pub fn strategy(&self, subsets: ActiveSubsets) -> Result<Box<dyn CostStrategy>> {
        let strategy: Box<dyn CostStrategy> = match self {
            Criterion::Li => Box::new(LiMeasure::new(subsets)),
            Criterion::Marley { weight } => Box::new(MarleyMeasure::new(subsets, *weight)?),
            Criterion::Bayesian { tau, active } => {
                Box::new(BayesianMeasure::new(subsets.factors(), *tau, active)?)
            }
        };
        Ok(strategy)
    }
}

/// Eigenvalues of `x'x`, or `None` when the smallest is at or below
/// `EIGEN_TOL * nrows`.
pub fn gram_eigenvalues(x: &DMatrix<f64>) -> Option<DVector<f64>> {
    let gram = x.tr_mul(x);
    let eigenvalues = SymmetricEigen::new(gram).eigenvalues;
    let min = eigenvalues.min();
    if min.is_nan() || min <= EIGEN_TOL * x.nrows() as f64 {
        None
    } else {
        Some(eigenvalues)
    }
}

/// Indices ordered by ascending score, `NaN` first, ties by index.
pub fn rank_ascending(scores: &[f64]) -> Vec<usize> {
    rank_by(scores, |a, b| a.partial_cmp(&b))
}

/// Indices ordered by descending score, `NaN` first, ties by index.
pub fn rank_descending(scores: &[f64]) -> Vec<usize> {
    rank_by(scores, |a, b| b.partial_cmp(&a))
}

fn rank_by<F>(scores: &[f64], cmp: F) -> Vec<usize>
where
    F: Fn(f64, f64) -> Option<Ordering>,
{
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // stable, so equal scores keep index order
    order.sort_by(|&i, &j| {
        let (a, b) = (scores[i], scores[j]);
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => cmp(a, b).unwrap_or(Ordering::Equal),
        }
    });
    order
}
