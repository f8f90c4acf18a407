use anyhow::*;
use clap::{Parser, ValueEnum};
use pretty_print_nalgebra::*;

use ssdgen::{find_best_ssd, Criterion, ExchangeConfigBuilder, RandomType};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CriterionArg {
    Li,
    Marley,
    Bayesian,
}

/// Generate a two-level supersaturated design with the columnwise-pairwise exchange algorithm
#[derive(Parser, Debug)]
#[command(name = "ssdgen", version, about)]
struct Args {
    /// Number of factors (columns)
    #[arg(short = 'm', long)]
    factors: usize,

    /// Assumed number of active factors, clamped to 2..=max(2, factors / 3)
    #[arg(short = 'f', long, default_value_t = 2)]
    active: usize,

    /// Number of runs, rounded up to even [default: nearest even >= ceil(factors / 2)]
    #[arg(short = 'n', long)]
    runs: Option<usize>,

    /// Columns exchanged per iteration [default: factors / 2]
    #[arg(short = 'k', long)]
    exchanges: Option<usize>,

    #[arg(long, default_value_t = 100)]
    max_iter: usize,

    /// Random designs sampled for the starting design
    #[arg(long, default_value_t = 200)]
    init_designs: usize,

    #[arg(short, long, value_enum, default_value_t = CriterionArg::Li)]
    criterion: CriterionArg,

    /// Marley weight, strictly between 0 and 1
    #[arg(short, long, default_value_t = 0.5)]
    weight: f64,

    /// Bayesian prior standard deviation
    #[arg(long, default_value_t = 1.0)]
    tau: f64,

    /// Comma-separated 0-based indices of physically active factors (Bayesian only)
    #[arg(long, value_delimiter = ',')]
    active_factors: Vec<usize>,

    /// Independent optimizer runs; the best design is reported
    #[arg(short, long, default_value_t = 1)]
    trials: usize,

    #[arg(short, long)]
    seed: Option<u64>,

    /// Report every accepted exchange
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn criterion(&self) -> Result<Criterion> {
        Ok(match self.criterion {
            CriterionArg::Li => Criterion::Li,
            CriterionArg::Marley => Criterion::Marley { weight: self.weight },
            CriterionArg::Bayesian => {
                let mut active = vec![false; self.factors];
                for &j in &self.active_factors {
                    if j >= self.factors {
                        bail!("active factor {} out of range for {} factors", j, self.factors);
                    }
                    active[j] = true;
                }
                Criterion::Bayesian { tau: self.tau, active }
            }
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut builder = ExchangeConfigBuilder::default();
    builder
        .factors(args.factors)
        .active(args.active)
        .max_iter(args.max_iter)
        .init_designs(args.init_designs)
        .verbose(args.verbose);
    if let Some(runs) = args.runs {
        builder.runs(runs);
    }
    if let Some(exchanges) = args.exchanges {
        builder.exchanges(exchanges);
    }
    let config = builder.build()?;
    let criterion = args.criterion()?;
    let random_type = args.seed.map_or(RandomType::Entropy, RandomType::Seeded);

    let (result, best_trial, summary) = find_best_ssd(&config, &criterion, random_type, args.trials, |trial, best| {
        log::info!("trial {}/{}: best measure {}", trial, args.trials, best);
    })?;

    println!(
        "{} runs x {} factors, active subset size {}, {} exchanges per iteration",
        config.runs(),
        config.factors(),
        config.active(),
        config.exchanges()
    );
    println!("{} measure: {} (trial {} of {})", result.criterion, result.best_measure, best_trial, args.trials);
    println!("max |r|: {}", result.max_abs_correlation);
    if result.collinear_pairs > 0 {
        println!(
            "{} identical or mirrored column pairs remain, try more than {} runs",
            result.collinear_pairs,
            config.runs()
        );
    }
    println!("E(s^2): {}", result.e_s2);
    println!("{:?} after {} iterations, {} exchanges", result.termination, result.iterations, result.history.len());
    if args.trials > 1 {
        println!(
            "trial measures: min {} max {} mean {}, {} of {} converged",
            summary.min, summary.max, summary.mean, summary.converged, args.trials
        );
    }
    println!("design: {}", pretty_print!(&result.best_design.as_sorted_rows()));
    Ok(())
}
