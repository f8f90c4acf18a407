use ssdgen::active_subsets::binomial;
use ssdgen::bayesian_measure::BayesianMeasure;
use ssdgen::{
    find_best_ssd, opt_ssd, ActiveSubsets, CostStrategy, Criterion, DesignMatrix, ExchangeConfig,
    ExchangeConfigBuilder, ExchangeOptimizer, OptimizerState, RandomType, Termination,
};

fn config(factors: usize, runs: usize, max_iter: usize) -> ExchangeConfig {
    ExchangeConfigBuilder::default()
        .factors(factors)
        .runs(runs)
        .max_iter(max_iter)
        .build()
        .unwrap()
}

#[test]
fn test_li_scenario() {
    let config = config(10, 8, 50);
    let result = opt_ssd(&config, &Criterion::Li, RandomType::Seeded(2024)).unwrap();

    assert_eq!(result.criterion, "li");
    assert_eq!(result.best_design.runs(), 8);
    assert_eq!(result.best_design.factors(), 10);
    assert!(result.best_design.validate().is_ok());
    assert!(result.best_design.is_balanced());
    assert!(result.max_abs_correlation < 1.0);
    assert!(result.best_measure.is_finite());
    assert!(result.iterations <= 50);
}

#[test]
fn test_marley_scenario_measure_never_increases() {
    let config = config(10, 8, 50);
    let mut optimizer = ExchangeOptimizer::from_criterion(
        config,
        &Criterion::Marley { weight: 0.5 },
        RandomType::Seeded(7),
    )
    .unwrap();
    optimizer.generate_initial_design();
    let start = optimizer.measure();
    let result = optimizer.optimize().unwrap();

    let mut previous = start;
    for record in &result.history {
        assert!(record.measure <= previous || previous.is_nan());
        previous = record.measure;
    }
    assert!(result.best_measure <= start);
    assert!(result.best_measure.is_finite());
    assert!(result.max_abs_correlation < 1.0);
    assert!(result.best_design.validate().is_ok());
}

#[test]
fn test_bayesian_vanishing_prior_decisions() {
    // a non-supersaturated case so the plain determinant is informative
    let plain = |d: &DesignMatrix| {
        let x = d.full_regression_matrix(None);
        x.tr_mul(&x).determinant().powf(1.0 / 4.0)
    };
    let bayes = BayesianMeasure::new(4, 1.0e8, &[false; 4]).unwrap();
    let mut rng = RandomType::Seeded(31).rng();
    let base = DesignMatrix::random(12, 4, &mut rng);

    let (plus, minus) = base.plus_minus_rows(2);
    let base_plain = plain(&base);
    let base_bayes = bayes.measure(&base, None);
    for &p in &plus {
        for &m in &minus {
            let mut trial = base.clone();
            trial.swap_in_column(2, p, m);
            let trial_plain = plain(&trial);
            if !(trial_plain > 1e-6 && base_plain > 1e-6) || (trial_plain - base_plain).abs() < 1e-6 {
                continue;
            }
            let accept_plain = trial_plain > base_plain;
            let accept_bayes = bayes.improves(bayes.measure(&trial, None), base_bayes);
            assert_eq!(accept_plain, accept_bayes);
        }
    }
}

#[test]
fn test_bayesian_scenario() {
    let config = config(10, 8, 30);
    let criterion = Criterion::Bayesian { tau: 1.0, active: vec![true, true] };
    let result = opt_ssd(&config, &criterion, RandomType::Seeded(5)).unwrap();
    assert_eq!(result.criterion, "bayesian");
    assert!(result.best_measure.is_finite());
    assert!(result.best_design.validate().is_ok());
}

#[test]
fn test_default_run_count_gives_collinear_free_designs() {
    // ten factors default to six runs, which hold exactly ten column classes
    let config = ExchangeConfigBuilder::default().factors(10).build().unwrap();
    assert_eq!(config.runs(), 6);
    for criterion in [Criterion::Li, Criterion::marley()] {
        for seed in 0..5 {
            let result = opt_ssd(&config, &criterion, RandomType::Seeded(seed)).unwrap();
            assert!(result.max_abs_correlation < 1.0, "{} seed {}", result.criterion, seed);
            assert!(result.best_measure.is_finite(), "{} seed {}", result.criterion, seed);
            assert_eq!(result.collinear_pairs, 0);
            assert_ne!(result.termination, Termination::CollinearityUnresolved);
            assert!(result.best_design.validate().is_ok());
        }
    }
}

#[test]
fn test_collinear_start_is_repaired() {
    let mut optimizer =
        ExchangeOptimizer::from_criterion(config(10, 6, 50), &Criterion::Li, RandomType::Seeded(9)).unwrap();
    let mut design = optimizer.generate_initial_design().clone();
    // make column 4 a mirror image of column 7
    let mirrored = design.design.column(7).map(|v| -v);
    design.design.set_column(4, &mirrored);
    optimizer.set_design(design).unwrap();
    assert!(optimizer.collinear_pairs() >= 1);
    assert!(optimizer.measure().is_nan());

    let result = optimizer.optimize().unwrap();
    assert!(result.max_abs_correlation < 1.0);
    assert!(result.best_measure.is_finite());
    assert_ne!(optimizer.state(), OptimizerState::CollinearityUnresolved);
}

#[test]
fn test_reproducible_trajectory() {
    for criterion in [Criterion::Li, Criterion::marley(), Criterion::bayesian()] {
        let a = opt_ssd(&config(12, 8, 20), &criterion, RandomType::Seeded(77)).unwrap();
        let b = opt_ssd(&config(12, 8, 20), &criterion, RandomType::Seeded(77)).unwrap();
        assert_eq!(a.best_design, b.best_design);
        assert_eq!(a.history, b.history);
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.termination, b.termination);
    }
}

#[test]
fn test_balance_holds_across_sizes() {
    for (factors, runs) in [(6, 4), (9, 6), (14, 8), (16, 10)] {
        let result = opt_ssd(&config(factors, runs, 10), &Criterion::Li, RandomType::Seeded(factors as u64)).unwrap();
        let d = &result.best_design;
        assert!(d.design.iter().all(|&v| v == 1.0 || v == -1.0));
        assert!((0..factors).all(|j| d.column_is_balanced(j)));
    }
}

#[test]
fn test_termination_reason_matches_iterations() {
    let result = opt_ssd(&config(10, 8, 100), &Criterion::Li, RandomType::Seeded(12)).unwrap();
    match result.termination {
        Termination::Converged => assert!(result.iterations < 100),
        Termination::IterationLimitReached => assert_eq!(result.iterations, 100),
        Termination::CollinearityUnresolved => panic!("8 runs leave room for 10 distinct columns"),
    }
}

#[test]
fn test_optimizer_states() {
    let mut optimizer =
        ExchangeOptimizer::from_criterion(config(10, 8, 5), &Criterion::Li, RandomType::Seeded(1)).unwrap();
    assert_eq!(optimizer.state(), OptimizerState::Uninitialized);
    optimizer.generate_initial_design();
    assert_eq!(optimizer.state(), OptimizerState::InitialDesignSelected);
    let result = optimizer.optimize().unwrap();
    let expected = match result.termination {
        Termination::Converged => OptimizerState::Converged,
        Termination::IterationLimitReached => OptimizerState::IterationLimitReached,
        Termination::CollinearityUnresolved => OptimizerState::CollinearityUnresolved,
    };
    assert_eq!(optimizer.state(), expected);
}

#[test]
fn test_active_subset_counts() {
    let spec = ActiveSubsets::new(15, 4);
    assert_eq!(spec.subsets(None).len(), binomial(15, 4));
    assert_eq!(spec.subsets(Some(7)).len(), binomial(14, 3));
    assert_eq!(ActiveSubsets::new(15, 40).active(), 5);
    assert_eq!(ActiveSubsets::new(15, 0).active(), 2);
}

#[test]
fn test_find_best_ssd_with_progress_callback() {
    let config = ExchangeConfigBuilder::default()
        .factors(10)
        .runs(8)
        .max_iter(10)
        .init_designs(50)
        .build()
        .unwrap();

    let mut updates = vec![];
    let (best, best_trial, summary) = find_best_ssd(&config, &Criterion::Li, RandomType::Seeded(3), 4, |trial, measure| {
        updates.push((trial, measure));
    })
    .unwrap();

    assert_eq!(updates.iter().map(|u| u.0).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert!(best_trial >= 1 && best_trial <= 4);
    assert_eq!(summary.measures.len(), 4);
    assert_eq!(summary.measures[best_trial - 1], best.best_measure);
    // larger is better for li, and the reported best never decreases
    assert!(updates.windows(2).all(|w| w[1].1 >= w[0].1));
    assert_eq!(best.best_measure, summary.max);
}

#[test]
fn test_find_best_ssd_first_trial_matches_single_run() {
    let config = config(8, 8, 10);
    let single = opt_ssd(&config, &Criterion::marley(), RandomType::Seeded(40)).unwrap();
    let (best, _, summary) = find_best_ssd(&config, &Criterion::marley(), RandomType::Seeded(40), 1, |_, _| {}).unwrap();
    assert_eq!(summary.measures, vec![single.best_measure]);
    assert_eq!(best.best_design, single.best_design);
}

#[test]
fn test_find_best_ssd_rejects_bad_input() {
    let config = config(8, 6, 10);
    assert!(find_best_ssd(&config, &Criterion::Li, RandomType::Seeded(1), 0, |_, _| {}).is_err());
    assert!(find_best_ssd(&config, &Criterion::Marley { weight: 1.5 }, RandomType::Seeded(1), 2, |_, _| {}).is_err());
}
