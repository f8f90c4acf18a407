use crate::correlation_matrix::CorrelationMatrix;
use crate::design_matrix::DesignMatrix;

/// Why the exchange loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The top-ranked exchange columns repeated between consecutive iterations.
    Converged,
    IterationLimitReached,
    /// The loop stopped while the design still had an identical or mirrored
    /// column pair that no single swap could break up.
    CollinearityUnresolved,
}

/// One accepted row-pair swap.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRecord {
    pub iteration: usize,
    pub column: usize,
    pub plus_row: usize,
    pub minus_row: usize,
    /// Whole-design measure after the swap.
    pub measure: f64,
}

/// Represents the result of optimising a supersaturated design.
///
/// # Fields
///
/// * `best_design` - The final N x M design
/// * `best_measure` - The criterion value of the final design; only comparable with results of the same criterion
/// * `criterion` - Name of the criterion that produced `best_measure`
/// * `max_abs_correlation` - The largest absolute correlation between two columns
/// * `e_s2` - Mean squared off-diagonal inner product of the columns
/// * `correlation` - The full column correlation matrix
/// * `iterations` - Number of exchange iterations performed
/// * `termination` - Why the exchange loop stopped
/// * `history` - Every accepted swap, in order
/// * `collinear_pairs` - Identical or mirrored column pairs left in `best_design`, 0 unless `termination` is `CollinearityUnresolved`
/// * `degenerate_candidates` - Number of collinear-free candidate swaps whose measure was NaN
/// * `collinear_candidates` - Number of candidate swaps rejected for leaving a perfectly correlated pair
#[derive(Debug, Clone)]
pub struct SsdResult {
    pub best_design: DesignMatrix,
    pub best_measure: f64,
    pub criterion: &'static str,
    pub max_abs_correlation: f64,
    pub e_s2: f64,
    pub correlation: CorrelationMatrix,
    pub iterations: usize,
    pub termination: Termination,
    pub history: Vec<ExchangeRecord>,
    pub collinear_pairs: usize,
    pub degenerate_candidates: usize,
    pub collinear_candidates: usize,
}

impl SsdResult {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}
