use nalgebra::DMatrix;

/// Pairwise column correlations of a balanced two-level design.
///
/// For balanced ±1 columns the correlation of columns `i` and `j` is
/// `s_i's_j / N`, so the diagonal is always 1.
#[derive(Default, Debug, Clone)]
pub struct CorrelationMatrix {
    pub correlation: DMatrix<f64>,
    pub runs: usize,
}

impl CorrelationMatrix {
    pub fn from_design(design: &DMatrix<f64>) -> Self {
        let runs = design.nrows();
        let correlation = design.tr_mul(design) / runs as f64;
        Self { correlation, runs }
    }

    pub fn factors(&self) -> usize {
        self.correlation.ncols()
    }

    /// Largest off-diagonal absolute correlation, 0 for a single column.
    pub fn max_abs(&self) -> f64 {
        let m = self.factors();
        let mut max: f64 = 0.0;
        for i in 0..m {
            for j in (i + 1)..m {
                max = max.max(self.correlation[(i, j)].abs());
            }
        }
        max
    }

    /// Columns that are identical to, or the mirror image of, some other column.
    pub fn perfectly_correlated_columns(&self) -> Vec<usize> {
        let m = self.factors();
        let mut flagged = vec![false; m];
        for i in 0..m {
            for j in (i + 1)..m {
                if self.correlation[(i, j)].abs() >= 1.0 {
                    flagged[i] = true;
                    flagged[j] = true;
                }
            }
        }
        (0..m).filter(|&j| flagged[j]).collect()
    }

    /// Number of column pairs that are identical or mirrored.
    pub fn perfectly_correlated_pairs(&self) -> usize {
        let m = self.factors();
        (0..m)
            .flat_map(|i| ((i + 1)..m).map(move |j| (i, j)))
            .filter(|&(i, j)| self.correlation[(i, j)].abs() >= 1.0)
            .count()
    }

    pub fn has_perfect_correlation(&self) -> bool {
        self.max_abs() >= 1.0
    }

    /// E(s²): mean of the squared off-diagonal inner products `s_i's_j`.
    pub fn e_s2(&self) -> f64 {
        let m = self.factors();
        if m < 2 {
            return 0.0;
        }
        let n = self.runs as f64;
        let mut total = 0.0;
        for i in 0..m {
            for j in (i + 1)..m {
                let s = self.correlation[(i, j)] * n;
                total += s * s;
            }
        }
        total / (m * (m - 1) / 2) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn test_orthogonal_columns() {
        let design = dmatrix![
            1.0, 1.0, 1.0;
            1.0, -1.0, -1.0;
            -1.0, 1.0, -1.0;
            -1.0, -1.0, 1.0
        ];
        let c = CorrelationMatrix::from_design(&design);
        assert_eq!(c.max_abs(), 0.0);
        assert_eq!(c.e_s2(), 0.0);
        assert!(c.perfectly_correlated_columns().is_empty());
        assert_eq!(c.perfectly_correlated_pairs(), 0);
        assert!(!c.has_perfect_correlation());
        assert!(c.correlation.diagonal().iter().all(|&d| d == 1.0));
    }

    #[test]
    fn test_mirrored_columns_are_flagged() {
        let design = dmatrix![
            1.0, -1.0, 1.0;
            1.0, -1.0, -1.0;
            -1.0, 1.0, 1.0;
            -1.0, 1.0, -1.0
        ];
        let c = CorrelationMatrix::from_design(&design);
        assert_eq!(c.max_abs(), 1.0);
        assert!(c.has_perfect_correlation());
        assert_eq!(c.perfectly_correlated_columns(), vec![0, 1]);
        assert_eq!(c.perfectly_correlated_pairs(), 1);
        // s_0's_1 = -4, the other two pairs are orthogonal
        assert!((c.e_s2() - 16.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_correlation() {
        let design = dmatrix![
            1.0, 1.0;
            1.0, 1.0;
            1.0, -1.0;
            -1.0, 1.0;
            -1.0, -1.0;
            -1.0, -1.0
        ];
        let c = CorrelationMatrix::from_design(&design);
        assert!((c.max_abs() - 2.0 / 6.0).abs() < 1e-12);
        assert!(c.perfectly_correlated_columns().is_empty());
    }

    #[test]
    fn test_pairs_within_a_repeated_class() {
        // columns 0, 1 and 2 are one class, so they form three pairs
        let design = dmatrix![
            1.0, 1.0, -1.0, 1.0;
            1.0, 1.0, -1.0, -1.0;
            -1.0, -1.0, 1.0, 1.0;
            -1.0, -1.0, 1.0, -1.0
        ];
        let c = CorrelationMatrix::from_design(&design);
        assert_eq!(c.perfectly_correlated_pairs(), 3);
        assert_eq!(c.perfectly_correlated_columns(), vec![0, 1, 2]);
    }
}
