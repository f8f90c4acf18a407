/**
 * create_ssd.rs - Columnwise-pairwise (CWPW) exchange for two-level supersaturated designs
 *
 * Each iteration ranks the columns by how much they are worth replacing, then for
 * each of the top-ranked columns tries every swap of a +1 entry with a -1 entry
 * and commits the single best swap. No candidate list is ever built.
 */

use std::collections::BTreeSet;

use anyhow::*;
use derive_builder::Builder;
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::active_subsets::{clamp_active, ActiveSubsets};
use crate::cost_strategy::{CostStrategy, Criterion};
use crate::design_matrix::DesignMatrix;
use crate::random_type::RandomType;
use crate::ssd_result::{ExchangeRecord, SsdResult, Termination};

pub const DEFAULT_ACTIVE: usize = 2;
pub const DEFAULT_MAX_ITER: usize = 100;
pub const DEFAULT_INIT_DESIGNS: usize = 200;

/// Run configuration. Built with [`ExchangeConfigBuilder`], which fills in the
/// derived defaults and clamps out-of-range values; immutable afterwards.
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(private, name = "build_unchecked", error = "anyhow::Error"))]
pub struct ExchangeConfig {

    /* number of factors (design columns), at least 2 */
    factors: usize,

    /* assumed-active subset size, clamped to 2..=max(2, factors / 3) */
    #[builder(default = "DEFAULT_ACTIVE")]
    active: usize,

    /* number of runs, rounded up to even; defaults to the nearest even >= ceil(factors / 2) */
    runs: usize,

    /* columns exchanged per iteration, clamped to 1..=factors; defaults to factors / 2 */
    exchanges: usize,

    #[builder(default = "DEFAULT_MAX_ITER")]
    max_iter: usize,

    /* random designs sampled when picking the starting design */
    #[builder(default = "DEFAULT_INIT_DESIGNS")]
    init_designs: usize,

    /* report every accepted exchange at info level */
    #[builder(default = "false")]
    verbose: bool,
}

impl ExchangeConfigBuilder {

    pub fn build(&self) -> Result<ExchangeConfig> {
        let mut builder = self.clone();
        builder
            .configure_remaining()
            .build_unchecked()
            .map_err(|e| anyhow!("Failed to build exchange config: {}", e))?
            .validated()
    }

    fn configure_remaining(&mut self) -> &mut Self {
        if let Some(factors) = self.factors {
            if self.runs.is_none() {
                self.runs = Some(default_runs(factors));
            }
            if self.exchanges.is_none() {
                self.exchanges = Some(factors / 2);
            }
        }
        self
    }
}

impl ExchangeConfig {

    fn validated(mut self) -> Result<Self> {
        if self.factors < 2 {
            bail!("a design needs at least 2 factors, got {}", self.factors);
        }

        let active = clamp_active(self.factors, self.active);
        if active != self.active {
            debug!("active subset size {} clamped to {}", self.active, active);
            self.active = active;
        }

        self.runs = design_size(self.runs)?;

        let exchanges = self.exchanges.clamp(1, self.factors);
        if exchanges != self.exchanges {
            debug!("exchange count {} clamped to {}", self.exchanges, exchanges);
            self.exchanges = exchanges;
        }

        self.init_designs = self.init_designs.max(1);
        Ok(self)
    }

    /// Copy with a new run count; `None` restores the default for this factor count.
    pub fn with_runs(&self, runs: Option<usize>) -> Result<Self> {
        let mut out = self.clone();
        out.runs = runs.unwrap_or_else(|| default_runs(self.factors));
        out.validated()
    }

    /// Copy with a new exchange count; `None` restores `factors / 2`.
    pub fn with_exchanges(&self, exchanges: Option<usize>) -> Result<Self> {
        let mut out = self.clone();
        out.exchanges = exchanges.unwrap_or(self.factors / 2);
        out.validated()
    }

    pub fn with_max_iter(&self, max_iter: usize) -> Result<Self> {
        let mut out = self.clone();
        out.max_iter = max_iter;
        out.validated()
    }

    pub fn factors(&self) -> usize {
        self.factors
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn init_designs(&self) -> usize {
        self.init_designs
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Nearest even run count >= ceil(factors / 2), and never below 2.
pub fn default_runs(factors: usize) -> usize {
    let half = (factors + 1) / 2;
    (half + half % 2).max(2)
}

/// Round a requested run count up to the next even value. Balanced columns need
/// an even number of runs and at least one of each level.
pub fn design_size(runs: usize) -> Result<usize> {
    let even = runs + runs % 2;
    if even < 2 {
        bail!("run count must be at least 2, got {}", runs);
    }
    if even != runs {
        debug!("run count {} rounded up to {}", runs, even);
    }
    Ok(even)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Uninitialized,
    InitialDesignSelected,
    Optimizing,
    Converged,
    IterationLimitReached,
    CollinearityUnresolved,
}

/// How a candidate swap compares with the current design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Fewer identical or mirrored column pairs than the current design,
    /// whatever the measure.
    Repaired,
    Improved,
    NotImproved,
    /// The measure came out NaN (singular projection or information matrix).
    Degenerate,
    /// The swap would leave two columns identical or mirrored.
    Collinear,
}

/// Lexicographic design order: fewer perfectly correlated pairs first, then
/// the strategy's own measure.
fn ranks_ahead(strategy: &dyn CostStrategy, pairs: usize, measure: f64, other_pairs: usize, other_measure: f64) -> bool {
    pairs < other_pairs || (pairs == other_pairs && strategy.improves(measure, other_measure))
}

#[derive(Debug, Clone)]
struct Candidate {
    plus_row: usize,
    minus_row: usize,
    measure: f64,
    collinear_pairs: usize,
}

impl Candidate {
    fn outcome(&self, strategy: &dyn CostStrategy, current: f64, current_pairs: usize) -> CandidateOutcome {
        if self.collinear_pairs < current_pairs {
            CandidateOutcome::Repaired
        } else if self.collinear_pairs > 0 {
            CandidateOutcome::Collinear
        } else if self.measure.is_nan() {
            CandidateOutcome::Degenerate
        } else if strategy.improves(self.measure, current) {
            CandidateOutcome::Improved
        } else {
            CandidateOutcome::NotImproved
        }
    }
}

/// Owns one design and improves it in place under a single cost strategy.
#[derive(Debug)]
pub struct ExchangeOptimizer {
    config: ExchangeConfig,
    strategy: Box<dyn CostStrategy>,
    rng: StdRng,
    design: Option<DesignMatrix>,
    measure: f64,
    collinear_pairs: usize,
    state: OptimizerState,
    iterations: usize,
    history: Vec<ExchangeRecord>,
    degenerate_candidates: usize,
    collinear_candidates: usize,
}

impl ExchangeOptimizer {

    pub fn new(config: ExchangeConfig, strategy: Box<dyn CostStrategy>, rng: StdRng) -> Self {
        Self {
            config,
            strategy,
            rng,
            design: None,
            measure: f64::NAN,
            collinear_pairs: 0,
            state: OptimizerState::Uninitialized,
            iterations: 0,
            history: vec![],
            degenerate_candidates: 0,
            collinear_candidates: 0,
        }
    }

    pub fn from_criterion(config: ExchangeConfig, criterion: &Criterion, random_type: RandomType) -> Result<Self> {
        let subsets = ActiveSubsets::new(config.factors(), config.active());
        let strategy = criterion
            .strategy(subsets)
            .map_err(|e| anyhow!("Failed to build cost strategy: {}", e))?;
        Ok(Self::new(config, strategy, random_type.rng()))
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn strategy(&self) -> &dyn CostStrategy {
        self.strategy.as_ref()
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn design(&self) -> Option<&DesignMatrix> {
        self.design.as_ref()
    }

    /// Whole-design measure of the current design, NaN before one is selected.
    pub fn measure(&self) -> f64 {
        self.measure
    }

    /// Identical or mirrored column pairs in the current design.
    pub fn collinear_pairs(&self) -> usize {
        self.collinear_pairs
    }

    pub fn history(&self) -> &[ExchangeRecord] {
        &self.history
    }

    fn current(&self) -> Result<&DesignMatrix> {
        self.design
            .as_ref()
            .ok_or_else(|| anyhow!("no design selected yet, generate or set one first"))
    }

    /// Change the run count (`None` for the default). Discards the current design.
    pub fn set_design_size(&mut self, runs: Option<usize>) -> Result<()> {
        self.config = self.config.with_runs(runs)?;
        self.design = None;
        self.measure = f64::NAN;
        self.collinear_pairs = 0;
        self.state = OptimizerState::Uninitialized;
        Ok(())
    }

    /// Start from a caller-supplied design instead of a sampled one.
    pub fn set_design(&mut self, design: DesignMatrix) -> Result<()> {
        if design.runs() != self.config.runs() || design.factors() != self.config.factors() {
            bail!(
                "design is {}x{}, expected {}x{}",
                design.runs(),
                design.factors(),
                self.config.runs(),
                self.config.factors()
            );
        }
        design.validate()?;
        self.measure = self.strategy.measure(&design, None);
        self.collinear_pairs = design.correlation().perfectly_correlated_pairs();
        self.design = Some(design);
        self.state = OptimizerState::InitialDesignSelected;
        Ok(())
    }

    /// Sample `init_designs` random balanced designs and keep the best.
    ///
    /// The first sample is always kept. After that a sample replaces the
    /// incumbent when it has fewer perfectly correlated column pairs, or as
    /// many and a better measure.
    pub fn generate_initial_design(&mut self) -> &DesignMatrix {
        let (runs, factors) = (self.config.runs(), self.config.factors());
        let strategy = self.strategy.as_ref();
        let mut best: Option<(DesignMatrix, f64, usize)> = None;

        for i in 0..self.config.init_designs() {
            let candidate = DesignMatrix::random(runs, factors, &mut self.rng);
            let measure = strategy.measure(&candidate, None);
            let pairs = candidate.correlation().perfectly_correlated_pairs();
            let replace = match &best {
                None => true,
                Some((_, best_measure, best_pairs)) => ranks_ahead(strategy, pairs, measure, *best_pairs, *best_measure),
            };
            trace!("initial design {}: measure {} collinear pairs {} kept {}", i, measure, pairs, replace);
            if replace {
                best = Some((candidate, measure, pairs));
            }
        }

        let (design, measure, pairs) = best.unwrap_or_else(|| {
            let design = DesignMatrix::random(runs, factors, &mut self.rng);
            let measure = strategy.measure(&design, None);
            let pairs = design.correlation().perfectly_correlated_pairs();
            (design, measure, pairs)
        });
        debug!(
            "initial {} design {}x{}: measure {} ({} perfectly correlated pairs)",
            strategy.name(),
            runs,
            factors,
            measure,
            pairs
        );
        self.measure = measure;
        self.collinear_pairs = pairs;
        self.state = OptimizerState::InitialDesignSelected;
        self.design.insert(design)
    }

    /// Column order in which to attempt exchanges, most deletion-worthy first.
    /// Columns in a perfectly correlated pair always come first.
    pub fn rank_columns_for_deletion(&self) -> Result<Vec<usize>> {
        let design = self.current()?;
        let strategy = self.strategy.as_ref();
        let scores: Vec<f64> = (0..design.factors())
            .into_par_iter()
            .map(|j| strategy.measure(design, Some(j)))
            .collect();
        let mut ranking = strategy.rank_for_deletion(&scores);

        let collinear = design.correlation().perfectly_correlated_columns();
        if !collinear.is_empty() {
            trace!("perfectly correlated columns {:?} moved to the front", collinear);
            ranking.sort_by_key(|j| !collinear.contains(j));
        }
        trace!("column scores {:?} ranking {:?}", scores, ranking);
        Ok(ranking)
    }

    fn evaluate_swaps(&self, column: usize) -> Result<Vec<Candidate>> {
        let design = self.current()?;
        if column >= design.factors() {
            bail!("column {} out of range for {} factors", column, design.factors());
        }
        let strategy = self.strategy.as_ref();
        let (plus, minus) = design.plus_minus_rows(column);
        let pairs: Vec<(usize, usize)> = plus
            .iter()
            .flat_map(|&p| minus.iter().map(move |&m| (p, m)))
            .collect();

        // collect keeps pair order, so selection below stays deterministic
        Ok(pairs
            .par_iter()
            .map(|&(plus_row, minus_row)| {
                let mut trial = design.clone();
                trial.swap_in_column(column, plus_row, minus_row);
                Candidate {
                    plus_row,
                    minus_row,
                    measure: strategy.measure(&trial, None),
                    collinear_pairs: trial.correlation().perfectly_correlated_pairs(),
                }
            })
            .collect())
    }

    /// Try every (+1 row, -1 row) swap in `column` and commit the best one.
    ///
    /// While the design has identical or mirrored column pairs, any swap that
    /// leaves fewer of them is accepted, fewest pairs first and the measure
    /// breaking ties. Once there are none, a swap must improve the measure
    /// without creating one. Ties go to the lowest (plus row, minus row) pair.
    /// Returns the committed swap.
    pub fn exchange_column(&mut self, column: usize, iteration: usize) -> Result<Option<ExchangeRecord>> {
        let candidates = self.evaluate_swaps(column)?;
        let strategy = self.strategy.as_ref();

        let mut best: Option<&Candidate> = None;
        for candidate in &candidates {
            match candidate.outcome(strategy, self.measure, self.collinear_pairs) {
                CandidateOutcome::Repaired | CandidateOutcome::Improved => {
                    let ahead = best.map_or(true, |b| {
                        ranks_ahead(strategy, candidate.collinear_pairs, candidate.measure, b.collinear_pairs, b.measure)
                    });
                    if ahead {
                        best = Some(candidate);
                    }
                }
                CandidateOutcome::Degenerate => self.degenerate_candidates += 1,
                CandidateOutcome::Collinear => self.collinear_candidates += 1,
                CandidateOutcome::NotImproved => {}
            }
        }

        let Some(best) = best.cloned() else {
            trace!("column {}: no improving swap among {} candidates", column, candidates.len());
            return Ok(None);
        };

        let design = self
            .design
            .as_mut()
            .ok_or_else(|| anyhow!("no design selected yet, generate or set one first"))?;
        design.swap_in_column(column, best.plus_row, best.minus_row);
        let record = ExchangeRecord {
            iteration,
            column,
            plus_row: best.plus_row,
            minus_row: best.minus_row,
            measure: best.measure,
        };
        if self.config.verbose() {
            info!(
                "iteration {} column {}: swapped rows {} and {}, {} {} -> {}, collinear pairs {} -> {}",
                iteration, column, best.plus_row, best.minus_row, self.strategy.name(), self.measure, best.measure,
                self.collinear_pairs, best.collinear_pairs
            );
        } else {
            debug!(
                "iteration {} column {}: swapped rows {} and {}, {} {} -> {}, collinear pairs {} -> {}",
                iteration, column, best.plus_row, best.minus_row, self.strategy.name(), self.measure, best.measure,
                self.collinear_pairs, best.collinear_pairs
            );
        }
        self.measure = best.measure;
        self.collinear_pairs = best.collinear_pairs;
        self.history.push(record.clone());
        Ok(Some(record))
    }

    /// Run the exchange loop until the top-ranked column set repeats on a
    /// design free of perfectly correlated pairs, or `max_iter` iterations
    /// have run. Samples a starting design first if none has been selected.
    ///
    /// A design that still has such a pair is never reported as converged:
    /// the loop keeps going while swaps break pairs up, and stops with
    /// [`Termination::CollinearityUnresolved`] once an iteration accepts nothing.
    pub fn optimize(&mut self) -> Result<SsdResult> {
        if self.design.is_none() {
            self.generate_initial_design();
        }
        self.state = OptimizerState::Optimizing;
        self.iterations = 0;
        self.history.clear();
        self.degenerate_candidates = 0;
        self.collinear_candidates = 0;

        let exchanges = self.config.exchanges();
        let mut previous: Option<BTreeSet<usize>> = None;
        let mut termination = Termination::IterationLimitReached;

        for iteration in 0..self.config.max_iter() {
            let ranking = self
                .rank_columns_for_deletion()
                .map_err(|e| anyhow!("Failed to rank columns: {}", e))?;
            let top: Vec<usize> = ranking.into_iter().take(exchanges).collect();
            let top_set: BTreeSet<usize> = top.iter().copied().collect();
            if self.collinear_pairs == 0 && previous.as_ref() == Some(&top_set) {
                termination = Termination::Converged;
                break;
            }

            debug!("iteration {}: exchanging columns {:?}", iteration, top);
            let mut accepted = 0;
            for &column in &top {
                let record = self
                    .exchange_column(column, iteration)
                    .map_err(|e| anyhow!("Failed to exchange column {}: {}", column, e))?;
                if record.is_some() {
                    accepted += 1;
                }
            }
            self.iterations = iteration + 1;
            previous = Some(top_set);

            // the loop draws no random numbers, so a stalled repair stays stalled
            if accepted == 0 && self.collinear_pairs > 0 {
                break;
            }
        }

        if self.collinear_pairs > 0 {
            termination = Termination::CollinearityUnresolved;
            warn!(
                "{} perfectly correlated column pairs remain after {} iterations",
                self.collinear_pairs, self.iterations
            );
        }
        self.state = match termination {
            Termination::Converged => OptimizerState::Converged,
            Termination::IterationLimitReached => OptimizerState::IterationLimitReached,
            Termination::CollinearityUnresolved => OptimizerState::CollinearityUnresolved,
        };

        let best_design = self.current()?.clone();
        let correlation = best_design.correlation();
        debug!(
            "{:?} after {} iterations: {} {}, max |r| {}, {} exchanges, {} degenerate and {} collinear candidates",
            termination,
            self.iterations,
            self.strategy.name(),
            self.measure,
            correlation.max_abs(),
            self.history.len(),
            self.degenerate_candidates,
            self.collinear_candidates
        );

        Ok(SsdResult {
            max_abs_correlation: correlation.max_abs(),
            e_s2: correlation.e_s2(),
            correlation,
            best_design,
            best_measure: self.measure,
            criterion: self.strategy.name(),
            iterations: self.iterations,
            termination,
            history: self.history.clone(),
            collinear_pairs: self.collinear_pairs,
            degenerate_candidates: self.degenerate_candidates,
            collinear_candidates: self.collinear_candidates,
        })
    }
}

/// Build an optimizer for `criterion` and run it once.
pub fn opt_ssd(config: &ExchangeConfig, criterion: &Criterion, random_type: RandomType) -> Result<SsdResult> {
    let mut optimizer = ExchangeOptimizer::from_criterion(config.clone(), criterion, random_type)
        .map_err(|e| anyhow!("Failed to build optimizer: {}", e))?;
    optimizer
        .optimize()
        .map_err(|e| anyhow!("Failed to optimize design: {}", e))
}
