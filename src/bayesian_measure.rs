use anyhow::*;
use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::cost_strategy::{rank_descending, CostStrategy, EIGEN_TOL};
use crate::design_matrix::DesignMatrix;

/// Bayesian D-criterion: `det(X'X + K)^(1/M)` with `X` the intercept plus the
/// kept columns and `K` a diagonal prior precision. Larger is better.
///
/// `K` holds `1 / tau^2` for factors not flagged active and 0 for flagged
/// factors and the intercept. For a column the criterion is evaluated with that
/// column removed, so the columns whose removal costs least are exchanged first.
#[derive(Debug, Clone)]
pub struct BayesianMeasure {
    factors: usize,
    tau: f64,
    active: Vec<bool>,
    /* prior precision, intercept first */
    prior: DVector<f64>,
}

impl BayesianMeasure {
    pub fn new(factors: usize, tau: f64, active: &[bool]) -> Result<Self> {
        if !(tau.is_finite() && tau > 0.0) {
            bail!("tau must be finite and positive, got {}", tau);
        }
        if active.len() > factors {
            bail!("{} active flags given for {} factors", active.len(), factors);
        }
        let mut flags = active.to_vec();
        flags.resize(factors, false);

        let precision = 1.0 / (tau * tau);
        let prior = DVector::from_fn(factors + 1, |i, _| {
            if i == 0 || flags[i - 1] {
                0.0
            } else {
                precision
            }
        });
        debug!(
            "bayesian prior: tau {}, {} of {} factors flagged active",
            tau,
            flags.iter().filter(|&&a| a).count(),
            factors
        );
        Ok(Self { factors, tau, active: flags, prior })
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn active(&self) -> &[bool] {
        &self.active
    }

    /// `X'X + K` over the intercept and every column except `deleted`.
    pub fn information_matrix(&self, design: &DesignMatrix, deleted: Option<usize>) -> DMatrix<f64> {
        let x = design.full_regression_matrix(deleted);
        let kept: Vec<f64> = (0..=self.factors)
            .filter(|&i| i == 0 || Some(i - 1) != deleted)
            .map(|i| self.prior[i])
            .collect();
        x.tr_mul(&x) + DMatrix::from_diagonal(&DVector::from_vec(kept))
    }
}

impl CostStrategy for BayesianMeasure {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn measure(&self, design: &DesignMatrix, column: Option<usize>) -> f64 {
        let info = self.information_matrix(design, column);
        let tol = EIGEN_TOL * design.runs() as f64;
        match info.cholesky() {
            Some(chol) => {
                let pivots = chol.l().diagonal().map(|d| d * d);
                if pivots.iter().any(|&p| p <= tol) {
                    return f64::NAN;
                }
                let log_det: f64 = pivots.iter().map(|p| p.ln()).sum();
                (log_det / self.factors as f64).exp()
            }
            None => f64::NAN,
        }
    }

    fn is_better(&self, new: f64, old: f64) -> bool {
        new > old
    }

    fn rank_for_deletion(&self, scores: &[f64]) -> Vec<usize> {
        rank_descending(scores)
    }
}
