use anyhow::*;

use crate::active_subsets::ActiveSubsets;
use crate::cost_strategy::{gram_eigenvalues, rank_descending, CostStrategy};
use crate::design_matrix::DesignMatrix;

/// Weighted log of an A-optimality term and an average VIF term, both averaged
/// over the assumed-active factor subsets. Smaller is better; an orthogonal
/// design scores 0.
///
/// For a subset with Gram eigenvalues `l_1..l_F`:
/// - VIF term: `N * sum(1 / l_i)`, averaged over subsets and divided by `F`
/// - A term: the same with the intercept eigenvalue `N` added, divided by `F + 1`
///
/// `score = W * ln(A) + (1 - W) * ln(V)`
#[derive(Debug, Clone)]
pub struct MarleyMeasure {
    subsets: ActiveSubsets,
    weight: f64,
}

impl MarleyMeasure {
    pub fn new(subsets: ActiveSubsets, weight: f64) -> Result<Self> {
        if !(weight > 0.0 && weight < 1.0) {
            bail!("Marley weight must lie strictly between 0 and 1, got {}", weight);
        }
        Ok(Self { subsets, weight })
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl CostStrategy for MarleyMeasure {
    fn name(&self) -> &'static str {
        "marley"
    }

    fn measure(&self, design: &DesignMatrix, column: Option<usize>) -> f64 {
        let n = design.runs() as f64;
        let f = self.subsets.active() as f64;
        let subsets = self.subsets.subsets(column);
        if subsets.is_empty() {
            return f64::NAN;
        }

        let mut v_sum = 0.0;
        let mut a_sum = 0.0;
        for subset in &subsets {
            let eigenvalues = match gram_eigenvalues(&design.submatrix(subset)) {
                Some(eigenvalues) => eigenvalues,
                None => return f64::NAN,
            };
            let reciprocal: f64 = eigenvalues.iter().map(|l| 1.0 / l).sum();
            v_sum += n * reciprocal;
            a_sum += n * (reciprocal + 1.0 / n);
        }

        let count = subsets.len() as f64;
        let v = v_sum / count / f;
        let a = a_sum / count / (f + 1.0);
        self.weight * a.ln() + (1.0 - self.weight) * v.ln()
    }

    fn is_better(&self, new: f64, old: f64) -> bool {
        new < old
    }

    fn rank_for_deletion(&self, scores: &[f64]) -> Vec<usize> {
        rank_descending(scores)
    }
}
