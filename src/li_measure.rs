use crate::active_subsets::ActiveSubsets;
use crate::cost_strategy::{gram_eigenvalues, rank_ascending, CostStrategy};
use crate::design_matrix::DesignMatrix;

/// Projection D-efficiency summed over the assumed-active factor subsets.
///
/// Each subset contributes `(prod eig(X'X / N))^(1/F)` where `X` is the
/// intercept plus the subset's columns. The design with the subset removed is
/// not used: with fewer runs than factors its Gram matrix is always singular.
/// Larger is better; for a column the sum
/// runs over the subsets containing it, and the lowest-scoring columns are
/// exchanged first.
#[derive(Debug, Clone)]
pub struct LiMeasure {
    subsets: ActiveSubsets,
}

impl LiMeasure {
    pub fn new(subsets: ActiveSubsets) -> Self {
        Self { subsets }
    }

    pub fn subsets(&self) -> &ActiveSubsets {
        &self.subsets
    }
}

impl CostStrategy for LiMeasure {
    fn name(&self) -> &'static str {
        "li"
    }

    fn measure(&self, design: &DesignMatrix, column: Option<usize>) -> f64 {
        let n = design.runs() as f64;
        let power = 1.0 / self.subsets.active() as f64;
        let mut total = 0.0;
        for subset in self.subsets.subsets(column) {
            let x = design.regression_matrix(&subset);
            match gram_eigenvalues(&x) {
                Some(eigenvalues) => total += (eigenvalues / n).product().powf(power),
                None => return f64::NAN,
            }
        }
        total
    }

    fn is_better(&self, new: f64, old: f64) -> bool {
        new > old
    }

    fn rank_for_deletion(&self, scores: &[f64]) -> Vec<usize> {
        rank_ascending(scores)
    }
}
