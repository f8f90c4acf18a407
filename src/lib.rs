pub mod active_subsets;
pub mod bayesian_measure;
pub mod correlation_matrix;
pub mod cost_strategy;
pub mod create_ssd;
pub mod design_matrix;
pub mod li_measure;
pub mod marley_measure;
pub mod random_type;
pub mod ssd_result;

pub use active_subsets::ActiveSubsets;
pub use cost_strategy::{CostStrategy, Criterion};
pub use create_ssd::{opt_ssd, ExchangeConfig, ExchangeConfigBuilder, ExchangeOptimizer, OptimizerState};
pub use design_matrix::DesignMatrix;
pub use random_type::RandomType;
pub use ssd_result::{ExchangeRecord, SsdResult, Termination};

use anyhow::*;
use log::debug;

/// Per-trial outcome of [`find_best_ssd`].
///
/// `min`, `max` and `mean` cover the finite measures only and are NaN when no
/// trial produced one.
#[derive(Debug, Clone, Default)]
pub struct TrialSummary {
    pub measures: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub converged: usize,
}

impl TrialSummary {
    fn from_trials(measures: Vec<f64>, converged: usize) -> Self {
        let finite: Vec<f64> = measures.iter().copied().filter(|m| m.is_finite()).collect();
        let (min, max, mean) = if finite.is_empty() {
            (f64::NAN, f64::NAN, f64::NAN)
        } else {
            (
                finite.iter().copied().fold(f64::INFINITY, f64::min),
                finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                finite.iter().sum::<f64>() / finite.len() as f64,
            )
        };
        Self { measures, min, max, mean, converged }
    }
}

/// Finds the best supersaturated design by running the exchange optimizer several times.
///
/// # Arguments
///
/// * `config` - Factor count, run count and exchange settings shared by every trial
/// * `criterion` - The design-quality criterion to optimise
/// * `random_type` - Seed source; a seeded source gives trial `i` (1-based) the seed `seed + i - 1`
/// * `trials` - Number of independent optimizer runs
/// * `on_update` - Callback function called after each trial with the trial number and the best measure so far
///
/// # Returns
///
/// Returns a tuple containing:
/// * The best design found (`SsdResult`): fewest perfectly correlated pairs, then the criterion's own direction
/// * The trial number where the best design was found
/// * A summary of every trial's measure
///
/// # Errors
///
/// Returns an error if the criterion parameters are invalid, `trials` is zero, or a trial fails
pub fn find_best_ssd<F>(
    config: &ExchangeConfig,
    criterion: &Criterion,
    random_type: RandomType,
    trials: usize,
    mut on_update: F,
) -> Result<(SsdResult, usize, TrialSummary)>
where
    F: FnMut(usize, f64),
{
    if trials == 0 {
        bail!("at least one trial is needed");
    }
    let strategy = criterion.strategy(ActiveSubsets::new(config.factors(), config.active()))?;

    let mut best: Option<(SsdResult, usize)> = None;
    let mut measures = Vec::with_capacity(trials);
    let mut converged = 0;
    for i in 1..=trials {
        let result = opt_ssd(config, criterion, random_type.for_trial(i - 1))
            .map_err(|e| anyhow!("Trial {} failed: {}", i, e))?;
        debug!("trial {}: {} {} ({:?})", i, result.criterion, result.best_measure, result.termination);

        measures.push(result.best_measure);
        if result.converged() {
            converged += 1;
        }
        let replace = match &best {
            None => true,
            Some((incumbent, _)) => {
                result.collinear_pairs < incumbent.collinear_pairs
                    || (result.collinear_pairs == incumbent.collinear_pairs
                        && strategy.improves(result.best_measure, incumbent.best_measure))
            }
        };
        if replace {
            best = Some((result, i));
        }
        if let Some((incumbent, _)) = &best {
            on_update(i, incumbent.best_measure);
        }
    }

    let (best_result, best_trial) = best.ok_or_else(|| anyhow!("no trial produced a design"))?;
    Ok((best_result, best_trial, TrialSummary::from_trials(measures, converged)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_summary() {
        let s = TrialSummary::from_trials(vec![1.0, f64::NAN, 3.0, 2.0], 2);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.converged, 2);
        assert_eq!(s.measures.len(), 4);

        let empty = TrialSummary::from_trials(vec![f64::NAN], 0);
        assert!(empty.mean.is_nan());
    }
}
