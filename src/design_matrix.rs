use anyhow::*;
use nalgebra::DMatrix;
use rand::Rng;

use crate::correlation_matrix::CorrelationMatrix;

/// A two-level design: `runs` rows, one column per factor, every entry -1 or +1.
///
/// Outside an exchange trial every column is balanced (as many +1 as -1), which
/// needs an even number of runs.
///
/// # Fields
///
/// * `design` - The N x M matrix of factor levels
#[derive(Default, Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub design: DMatrix<f64>,
}

impl DesignMatrix {
    /// Wrap an existing matrix, rejecting anything that is not a balanced ±1 design.
    pub fn from_matrix(design: &DMatrix<f64>) -> Result<Self> {
        let out = Self { design: design.clone() };
        out.validate()?;
        Ok(out)
    }

    /// A design whose columns are independent random balanced columns.
    ///
    /// Each column is a random permutation of `1..=runs` mapped odd to -1 and
    /// even to +1.
    pub fn random<R: Rng + ?Sized>(runs: usize, factors: usize, rng: &mut R) -> Self {
        let mut design = DMatrix::zeros(runs, factors);
        let mut rows: Vec<usize> = (1..=runs).collect();
        for j in 0..factors {
            permute_rows(&mut rows, rng);
            for (i, &r) in rows.iter().enumerate() {
                design[(i, j)] = if r % 2 == 0 { 1.0 } else { -1.0 };
            }
        }
        Self { design }
    }

    pub fn runs(&self) -> usize {
        self.design.nrows()
    }

    pub fn factors(&self) -> usize {
        self.design.ncols()
    }

    pub fn column_sum(&self, j: usize) -> f64 {
        self.design.column(j).sum()
    }

    pub fn column_is_balanced(&self, j: usize) -> bool {
        self.column_sum(j) == 0.0
    }

    pub fn is_balanced(&self) -> bool {
        (0..self.factors()).all(|j| self.column_is_balanced(j))
    }

    pub fn validate(&self) -> Result<()> {
        if self.runs() < 2 || self.runs() % 2 != 0 {
            bail!("a balanced design needs an even number of runs, got {}", self.runs());
        }
        if self.factors() < 2 {
            bail!("a design needs at least 2 factors, got {}", self.factors());
        }
        if let Some(((i, j), v)) = self
            .design
            .iter()
            .enumerate()
            .map(|(idx, v)| ((idx % self.runs(), idx / self.runs()), v))
            .find(|(_, v)| **v != 1.0 && **v != -1.0)
        {
            bail!("entry ({}, {}) is {}, expected -1 or +1", i, j, v);
        }
        if let Some(j) = (0..self.factors()).find(|&j| !self.column_is_balanced(j)) {
            bail!("column {} is unbalanced (sum {})", j, self.column_sum(j));
        }
        Ok(())
    }

    /// Rows of column `j` holding +1 and -1, each in ascending order.
    pub fn plus_minus_rows(&self, j: usize) -> (Vec<usize>, Vec<usize>) {
        let column = self.design.column(j);
        let plus = (0..self.runs()).filter(|&i| column[i] > 0.0).collect();
        let minus = (0..self.runs()).filter(|&i| column[i] < 0.0).collect();
        (plus, minus)
    }

    /// Swap two entries of column `j`. Swapping a +1 with a -1 keeps the column balanced.
    pub fn swap_in_column(&mut self, j: usize, a: usize, b: usize) {
        self.design.swap((a, j), (b, j));
    }

    /// The given design columns, in the order listed.
    pub fn submatrix(&self, columns: &[usize]) -> DMatrix<f64> {
        DMatrix::from_fn(self.runs(), columns.len(), |r, c| self.design[(r, columns[c])])
    }

    /// Intercept column followed by the given design columns.
    pub fn regression_matrix(&self, columns: &[usize]) -> DMatrix<f64> {
        DMatrix::from_fn(self.runs(), columns.len() + 1, |r, c| {
            if c == 0 {
                1.0
            } else {
                self.design[(r, columns[c - 1])]
            }
        })
    }

    /// Intercept plus every column except `deleted`.
    pub fn full_regression_matrix(&self, deleted: Option<usize>) -> DMatrix<f64> {
        let kept: Vec<usize> = (0..self.factors()).filter(|&j| Some(j) != deleted).collect();
        self.regression_matrix(&kept)
    }

    pub fn correlation(&self) -> CorrelationMatrix {
        CorrelationMatrix::from_design(&self.design)
    }

    pub fn max_abs_correlation(&self) -> f64 {
        self.correlation().max_abs()
    }

    /// Rows in lexicographic order, -1 before +1. Useful for stable printing.
    pub fn as_sorted_rows(&self) -> DMatrix<f64> {
        let mut rows: Vec<Vec<f64>> = self
            .design
            .row_iter()
            .map(|r| r.iter().copied().collect())
            .collect();
        rows.sort_by(|a, b| {
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        DMatrix::from_fn(self.runs(), self.factors(), |i, j| rows[i][j])
    }
}

/// Randomly permutes `a` in place using the Fike algorithm. See Fike,
/// "A permutation generation method", The Computer Journal, 18-1, Feb 75, 21-22.
pub fn permute_rows<T, R: Rng + ?Sized>(a: &mut [T], rng: &mut R) {
    for i in 1..a.len() {
        let j = rng.gen_range(0..=i);
        a.swap(i, j);
    }
}
